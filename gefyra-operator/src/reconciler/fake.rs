use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use gefyra_core::connection::{
    ClientRegistration, ConnectionProvider, DestinationKey, Parameters, PeerConfig,
    ProviderError, ValidationHints,
};

/// In-memory provider recording the calls reconcilers make.
#[derive(Default)]
pub struct FakeProvider {
    pub unready: AtomicBool,
    pub unavailable: AtomicBool,
    /// simulates another worker registering the peer first
    pub racing_add: AtomicBool,
    pub add_peer_calls: AtomicUsize,
    pub peers: Mutex<BTreeSet<String>>,
    pub destinations: Mutex<BTreeMap<DestinationKey, String>>,
    pub denied_subnets: Mutex<Vec<String>>,
}

impl FakeProvider {
    fn check_available(&self) -> Result<(), ProviderError> {
        match self.unavailable.load(Ordering::SeqCst) {
            true => Err(ProviderError::Unavailable("fake is down".to_owned())),
            false => Ok(()),
        }
    }

    fn has_peer(&self, peer_id: &str) -> bool {
        self.peers.lock().unwrap().contains(peer_id)
    }
}

#[async_trait]
impl ConnectionProvider for FakeProvider {
    fn provider_type(&self) -> &'static str {
        "stowaway"
    }

    async fn installed(&self, _config: Option<&Parameters>) -> Result<bool, ProviderError> {
        Ok(true)
    }

    async fn install(&self, _config: Option<&Parameters>) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn uninstall(&self, _config: Option<&Parameters>) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn ready(&self) -> bool {
        !self.unready.load(Ordering::SeqCst)
    }

    async fn add_peer(
        &self,
        peer_id: &str,
        _parameters: Option<&Parameters>,
    ) -> Result<(), ProviderError> {
        self.check_available()?;
        self.add_peer_calls.fetch_add(1, Ordering::SeqCst);

        let mut peers = self.peers.lock().unwrap();
        if self.racing_add.load(Ordering::SeqCst) {
            peers.insert(peer_id.to_owned());
        }

        match peers.insert(peer_id.to_owned()) {
            true => Ok(()),
            false => Err(ProviderError::Conflict(peer_id.to_owned())),
        }
    }

    async fn remove_peer(&self, peer_id: &str) -> Result<(), ProviderError> {
        self.check_available()?;
        self.peers.lock().unwrap().remove(peer_id);
        self.destinations
            .lock()
            .unwrap()
            .retain(|key, _| key.peer_id != peer_id);

        Ok(())
    }

    async fn get_peer_config(&self, peer_id: &str) -> Result<PeerConfig, ProviderError> {
        self.check_available()?;

        match self.has_peer(peer_id) {
            true => Ok(BTreeMap::from([(
                "Interface.Address".to_owned(),
                "192.168.99.2".to_owned(),
            )])),
            false => Err(ProviderError::NotFound(peer_id.to_owned())),
        }
    }

    async fn peer_exists(&self, peer_id: &str) -> Result<bool, ProviderError> {
        self.check_available()?;

        Ok(self.has_peer(peer_id))
    }

    async fn add_destination(
        &self,
        peer_id: &str,
        destination_ip: &str,
        destination_port: i32,
        _parameters: Option<&Parameters>,
    ) -> Result<String, ProviderError> {
        self.check_available()?;
        let key = DestinationKey::parse(peer_id, destination_ip, destination_port)?;

        if !self.has_peer(peer_id) {
            return Err(ProviderError::NotFound(peer_id.to_owned()));
        }

        let mut destinations = self.destinations.lock().unwrap();
        let next = 10000 + destinations.len();
        let url = destinations
            .entry(key)
            .or_insert_with(|| format!("proxy-{next}.gefyra.svc.cluster.local:{next}"));

        Ok(url.to_owned())
    }

    async fn remove_destination(
        &self,
        peer_id: &str,
        destination_ip: &str,
        destination_port: i32,
    ) -> Result<(), ProviderError> {
        self.check_available()?;
        let key = DestinationKey::parse(peer_id, destination_ip, destination_port)?;
        self.destinations.lock().unwrap().remove(&key);

        Ok(())
    }

    async fn destination_exists(
        &self,
        peer_id: &str,
        destination_ip: &str,
        destination_port: i32,
    ) -> Result<bool, ProviderError> {
        let key = DestinationKey::parse(peer_id, destination_ip, destination_port)?;

        Ok(self.destinations.lock().unwrap().contains_key(&key))
    }

    async fn get_destination(
        &self,
        peer_id: &str,
        destination_ip: &str,
        destination_port: i32,
    ) -> Result<String, ProviderError> {
        let key = DestinationKey::parse(peer_id, destination_ip, destination_port)?;

        self.destinations
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(key.to_string()))
    }

    async fn validate(
        &self,
        client: &ClientRegistration,
        hints: &ValidationHints,
    ) -> Result<(), ProviderError> {
        let subnet = match client.parameters.get("subnet") {
            Some(subnet) => subnet,
            None => return Ok(()),
        };

        if hints.occupied_subnets.iter().any(|s| &s.to_string() == subnet) {
            self.denied_subnets.lock().unwrap().push(subnet.to_owned());

            return Err(ProviderError::AdmissionDenied(format!(
                "{subnet} is already in use"
            )));
        }

        Ok(())
    }
}
