use ini::Ini;

use crate::connection::{PeerConfig, ProviderError};

/// Flattens a WireGuard peer configuration into `Section.Key` entries, e.g.
/// `Interface.Address` or `Peer.Endpoint`.
pub fn parse_peer_config(raw: &str) -> Result<PeerConfig, ProviderError> {
    let ini = Ini::load_from_str(raw).map_err(|err| {
        ProviderError::Internal(format!("Couldn't parse the peer configuration! {err}"))
    })?;
    let mut config = PeerConfig::new();

    for (section, properties) in ini.iter() {
        let section = match section {
            Some(section) => section,
            None => continue,
        };

        for (key, value) in properties.iter() {
            config.insert(format!("{section}.{key}"), value.to_owned());
        }
    }

    if config.is_empty() {
        return Err(ProviderError::Internal(
            "Peer configuration is empty!".to_owned(),
        ));
    }

    Ok(config)
}
