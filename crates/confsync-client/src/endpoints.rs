//! URL and header construction for the configuration service.

use base64::{engine::general_purpose, Engine as _};
use url::Url;

use crate::error::{ClientError, ClientResult};

pub const APP_ID_HEADER: &str = "appid";
pub const ENV_HEADER: &str = "env";

/// `Basic base64(app_id:secret)`
pub fn basic_authorization(app_id: &str, secret: &str) -> String {
    format!("Basic {}", general_purpose::STANDARD.encode(format!("{}:{}", app_id, secret)))
}

/// `{server}/api/config/app/{app_id}?env={env}`
pub fn pull_url(server: &str, app_id: &str, env: &str) -> ClientResult<Url> {
    let mut url = parse_base(server)?;
    url.path_segments_mut()
        .map_err(|()| not_a_base(server))?
        .pop_if_empty()
        .extend(["api", "config", "app", app_id]);
    url.query_pairs_mut().append_pair("env", env);
    Ok(url)
}

/// `{ws-server}/ws?client_name={name}&client_tag={tag}` with http→ws, https→wss.
pub fn push_url(server: &str, name: &str, tag: &str) -> ClientResult<Url> {
    let mut url = parse_base(server)?;
    let scheme = if url.scheme().eq_ignore_ascii_case("https") { "wss" } else { "ws" };
    url.set_scheme(scheme).map_err(|()| {
        ClientError::Configuration(format!("cannot derive websocket url from '{}'", server))
    })?;
    url.path_segments_mut().map_err(|()| not_a_base(server))?.pop_if_empty().push("ws");
    url.query_pairs_mut().append_pair("client_name", name).append_pair("client_tag", tag);
    Ok(url)
}

fn parse_base(server: &str) -> ClientResult<Url> {
    Url::parse(server)
        .map_err(|e| ClientError::Configuration(format!("invalid server url '{}': {}", server, e)))
}

fn not_a_base(server: &str) -> ClientError {
    ClientError::Configuration(format!("server url '{}' cannot carry a path", server))
}
