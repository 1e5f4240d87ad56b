//! Version-range constraint evaluation for mod dependencies.
//!
//! Two dialects are understood: predicate tokens (`>=1.20 <1.21`,
//! `^1.19.2`, `1.20.1 || 1.20.4`) and bracket intervals (`[1.20,1.21)`).
//! Anything else is treated as satisfied — a permissive default, so a
//! dialect this evaluator does not understand never produces a false
//! "incompatible" verdict.

type Version = [u32; 3];

/// Decide whether `target` (a Minecraft version like `"1.20.4"`) satisfies
/// the dependency constraint `constraint`. Total: never fails.
pub fn matches(constraint: &str, target: &str) -> bool {
    let expr = constraint.trim();
    if expr.is_empty() || expr == "*" || expr.contains(target) {
        return true;
    }

    let Some(target_version) = parse_version_lenient(target) else {
        return true;
    };

    if let Some(satisfied) = match_interval(expr, target_version) {
        return satisfied;
    }

    // OR over `||`-separated clauses, AND over the tokens of each clause.
    expr.split("||")
        .any(|clause| clause_matches(clause, target_version))
}

fn clause_matches(clause: &str, target: Version) -> bool {
    clause
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .all(|token| token_matches(token, target))
}

fn token_matches(token: &str, target: Version) -> bool {
    if token == "*" || token.eq_ignore_ascii_case("x") {
        return true;
    }

    let (op, version_part) = split_operator(token);
    let Some(version) = parse_version_strict(version_part) else {
        // Unparseable tokens contribute nothing, they never force failure.
        return true;
    };

    match op {
        Op::Ge => target >= version,
        Op::Le => target <= version,
        Op::Gt => target > version,
        Op::Lt => target < version,
        Op::Eq => target == version,
        // Same major, at least the given version.
        Op::Caret => target[0] == version[0] && target >= version,
        // Same major and minor, at least the given version.
        Op::Tilde => target[0] == version[0] && target[1] == version[1] && target >= version,
    }
}

#[derive(Clone, Copy)]
enum Op {
    Ge,
    Le,
    Gt,
    Lt,
    Eq,
    Caret,
    Tilde,
}

fn split_operator(token: &str) -> (Op, &str) {
    for (prefix, op) in [
        (">=", Op::Ge),
        ("<=", Op::Le),
        (">", Op::Gt),
        ("<", Op::Lt),
        ("=", Op::Eq),
        ("^", Op::Caret),
        ("~", Op::Tilde),
    ] {
        if let Some(rest) = token.strip_prefix(prefix) {
            return (op, rest);
        }
    }
    (Op::Eq, token)
}

/// `[1.20,1.21)` interval form. Returns `None` when `expr` is not an
/// interval at all, so the caller falls through to predicate parsing.
fn match_interval(expr: &str, target: Version) -> Option<bool> {
    let mut chars = expr.chars();
    let lower_inclusive = match chars.next()? {
        '[' => true,
        '(' => false,
        _ => return None,
    };
    let upper_inclusive = match chars.next_back()? {
        ']' => true,
        ')' => false,
        _ => return None,
    };

    let inner = &expr[1..expr.len() - 1];
    let (lower, upper) = inner.split_once(',')?;

    let mut satisfied = true;
    // An empty or unparseable bound is open-ended.
    if let Some(lower) = parse_version_strict(lower.trim()) {
        satisfied &= if lower_inclusive {
            target >= lower
        } else {
            target > lower
        };
    }
    if let Some(upper) = parse_version_strict(upper.trim()) {
        satisfied &= if upper_inclusive {
            target <= upper
        } else {
            target < upper
        };
    }

    Some(satisfied)
}

/// Up to three numeric components, missing trailing components default
/// to 0. Lenient: each component is its leading digit run, so
/// `"1.20.4-pre1"` parses as `(1, 20, 4)`. `None` only when the first
/// component carries no digits at all.
fn parse_version_lenient(version: &str) -> Option<Version> {
    let mut components = [0u32; 3];
    for (i, part) in version.split('.').take(3).enumerate() {
        let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
        match digits.parse::<u32>() {
            Ok(n) => components[i] = n,
            Err(_) if i == 0 => return None,
            Err(_) => break,
        }
    }
    Some(components)
}

/// Strict variant for constraint-side versions: every present component
/// must be fully numeric, otherwise the token is not a version.
fn parse_version_strict(version: &str) -> Option<Version> {
    if version.is_empty() {
        return None;
    }
    let mut components = [0u32; 3];
    for (i, part) in version.split('.').enumerate() {
        if i >= 3 {
            break;
        }
        components[i] = part.parse::<u32>().ok()?;
    }
    Some(components)
}
