use crate::objects::SuiAddress;

/// Source of the caller's account. `None` means nobody is signed in.
pub trait IdentityProvider {
    fn current_address(&self) -> Option<SuiAddress>;
}

impl IdentityProvider for Option<SuiAddress> {
    fn current_address(&self) -> Option<SuiAddress> {
        self.clone()
    }
}

/// The wallet account for this session and whether it is currently connected.
#[derive(Clone, Debug, Default)]
pub struct WalletSession {
    address: Option<SuiAddress>,
    connected: bool,
}

impl WalletSession {
    pub fn connected(address: SuiAddress) -> Self {
        Self {
            address: Some(address),
            connected: true,
        }
    }

    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn known_address(&self) -> Option<&SuiAddress> {
        self.address.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.connected && self.address.is_some()
    }

    /// Reconnects to the last known account. Returns whether an account is now connected.
    pub fn connect(&mut self) -> bool {
        self.connected = self.address.is_some();
        self.connected
    }

    /// Connects with the wallet's current account when it reports one, falling
    /// back to the last known account otherwise.
    pub fn reconnect(&mut self, active: Option<SuiAddress>) -> bool {
        if let Some(address) = active {
            self.address = Some(address);
        }
        self.connect()
    }

    pub fn disconnect(&mut self) {
        self.connected = false;
    }
}

impl IdentityProvider for WalletSession {
    fn current_address(&self) -> Option<SuiAddress> {
        if self.connected {
            self.address.clone()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn wallet_session__hides_address_while_disconnected() {
        // given
        let address = SuiAddress::new("0xa11ce").unwrap();
        let mut session = WalletSession::connected(address.clone());

        // when
        session.disconnect();

        // then
        assert_eq!(session.current_address(), None);
        assert_eq!(session.known_address(), Some(&address));
        assert!(session.connect());
        assert_eq!(session.current_address(), Some(address));
    }

    #[test]
    fn reconnect__adopts_account_that_appeared_after_startup() {
        // given
        let mut session = WalletSession::disconnected();
        let address = SuiAddress::new("0xb0b").unwrap();

        // when
        let connected = session.reconnect(Some(address.clone()));

        // then
        assert!(connected);
        assert_eq!(session.current_address(), Some(address));
    }

    #[test]
    fn reconnect__keeps_known_account_when_wallet_reports_none() {
        let address = SuiAddress::new("0xa11ce").unwrap();
        let mut session = WalletSession::connected(address.clone());
        session.disconnect();

        assert!(session.reconnect(None));
        assert_eq!(session.current_address(), Some(address));
    }

    #[test]
    fn wallet_session__cannot_connect_without_an_account() {
        let mut session = WalletSession::disconnected();
        assert!(!session.connect());
        assert_eq!(session.current_address(), None);
    }
}
