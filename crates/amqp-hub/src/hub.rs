use amqp_types::AmqpOutputConfig;
use async_trait::async_trait;

use crate::barrier::{ConnectionRef, UsageRef};
use crate::channel::BrokerChannel;
use crate::error::{Error, Result};

/// PKCS#12 client identity.
#[derive(Clone, Default)]
pub struct TlsIdentity {
    pub der: Vec<u8>,
    pub password: String,
}

impl std::fmt::Debug for TlsIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsIdentity")
            .field("der_len", &self.der.len())
            .finish_non_exhaustive()
    }
}

/// TLS material already loaded into memory.
#[derive(Debug, Clone, Default)]
pub struct TlsSettings {
    /// PEM-encoded CA chain
    pub cert_chain: Option<String>,
    pub identity: Option<TlsIdentity>,
}

/// How the hub should open a new physical connection.
#[derive(Debug, Clone, Default)]
pub struct Dialer {
    pub tls: Option<TlsSettings>,
    /// Shown in the broker's management UI.
    pub connection_name: Option<String>,
}

impl Dialer {
    /// Build the dialer for `config`, loading TLS files for `amqps://` URLs.
    pub fn from_config(config: &AmqpOutputConfig) -> Result<Self> {
        if !config.is_tls() {
            return Ok(Self::default());
        }

        let tls = &config.tls;
        let cert_chain = match &tls.cert_chain_file {
            Some(path) => Some(std::fs::read_to_string(path).map_err(|e| {
                Error::Tls(format!("cannot read cert chain {}: {e}", path.display()))
            })?),
            None => None,
        };
        let identity = match &tls.identity_file {
            Some(path) => Some(TlsIdentity {
                der: std::fs::read(path).map_err(|e| {
                    Error::Tls(format!("cannot read identity {}: {e}", path.display()))
                })?,
                password: tls.identity_password.clone(),
            }),
            None => None,
        };

        Ok(Self {
            tls: Some(TlsSettings {
                cert_chain,
                identity,
            }),
            connection_name: None,
        })
    }

    pub fn with_connection_name(mut self, name: &str) -> Self {
        self.connection_name = Some(name.to_string());
        self
    }
}

/// What `ConnectionHub::get_channel` hands out.
pub struct ChannelLease {
    pub channel: Box<dyn BrokerChannel>,
    /// Released once the holder stops using `channel`.
    pub usage: UsageRef,
    /// Completes after the underlying physical connection is closed.
    pub connection: ConnectionRef,
}

/// Owner of the physical broker connections.
///
/// Implementations share one connection per URL among all callers and issue
/// a fresh channel per `get_channel` call.
#[async_trait]
pub trait ConnectionHub: Send + Sync {
    async fn get_channel(&self, url: &str, dialer: &Dialer) -> Result<ChannelLease>;

    /// Ask the hub to close the connection behind `connection` once every
    /// usage reference on it has been released. Does not wait.
    async fn close(&self, url: &str, connection: &ConnectionRef);
}
