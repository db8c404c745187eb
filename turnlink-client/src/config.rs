use props_util::Properties;
use std::net::SocketAddr;
use turnlink_proto::Credential;

#[derive(Properties, Debug, Clone)]
pub struct ClientConfig {
    #[prop(env = "TURNLINK_SERVER_ADDR")]
    pub server_addr: SocketAddr,
    #[prop(env = "TURNLINK_USERNAME")]
    pub username: Option<String>,
    #[prop(env = "TURNLINK_PASSWORD")]
    pub password: Option<String>,
    #[prop(env = "TURNLINK_REALM")]
    pub realm: Option<String>,
    #[prop(env = "TURNLINK_SOFTWARE")]
    pub software: Option<String>,
}

impl ClientConfig {
    pub fn new(server_addr: SocketAddr) -> Self {
        Self {
            server_addr,
            username: None,
            password: None,
            realm: None,
            software: None,
        }
    }

    /// Requests are signed only when both username and password are present.
    /// A realm selects long-term credentials, otherwise short-term.
    pub fn credential(&self) -> Option<Credential> {
        let (username, password) = match (&self.username, &self.password) {
            (Some(username), Some(password)) => (username.clone(), password.clone()),
            _ => return None,
        };

        Some(match &self.realm {
            Some(realm) => Credential::LongTerm {
                username,
                realm: realm.clone(),
                password,
            },
            None => Credential::ShortTerm { username, password },
        })
    }
}
