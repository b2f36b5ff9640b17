//! Transport selection from the gateway URL.

use std::sync::Arc;

use difsync_engine::{
    HttpTransport, SessionConfig, SyncError, SyncTransport, TcpTransport, TELNET_SCHEME,
};

use crate::error::CliResult;
use crate::http::ReqwestClient;

/// Opens the transport for `config.gateway`: raw TCP for `telnet://`,
/// form posts for `http://` and `https://`.
pub fn connect(config: &SessionConfig) -> CliResult<Arc<dyn SyncTransport>> {
    let gateway = config.gateway.as_str();
    if gateway.starts_with(TELNET_SCHEME) {
        return Ok(Arc::new(TcpTransport::from_url(gateway, config.timeout)?));
    }
    if gateway.starts_with("http://") || gateway.starts_with("https://") {
        let transport = HttpTransport::new(gateway, ReqwestClient::new()?)
            .with_cookie(config.cookie.clone())
            .with_timeout(config.timeout);
        return Ok(Arc::new(transport));
    }
    Err(SyncError::InvalidConfig(format!("unsupported gateway URL: {gateway}")).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_transport_by_scheme() {
        assert!(connect(&SessionConfig::new("telnet://localhost:3017")).is_ok());
        assert!(connect(&SessionConfig::new("http://localhost/scripts/q.py")).is_ok());
        assert!(connect(&SessionConfig::new("ftp://localhost/")).is_err());
        assert!(connect(&SessionConfig::new("telnet://")).is_err());
    }
}
