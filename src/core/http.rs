use reqwest::Client;

const APP_USER_AGENT: &str = "EmberLauncher/0.1.0";

pub fn build_http_client() -> Result<Client, reqwest::Error> {
    Client::builder().user_agent(APP_USER_AGENT).build()
}
