use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::push::PushSubscription;

/// Parsed `User-Agent` fields. Populated by a heuristic classifier in
/// `imcore::device_resolver` (no dedicated UA-parsing crate is used; see
/// DESIGN.md).
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserAgentInfo {
    pub raw: String,
    pub name: String,
    pub version: String,
    pub os: String,
    pub os_version: String,
    pub device: String,
    pub mobile: bool,
    pub tablet: bool,
    pub desktop: bool,
    pub bot: bool,
}

impl UserAgentInfo {
    /// `"web" | "mobile" | "tablet" | "desktop" | "bot"` classification,
    /// in that precedence order.
    pub fn kind(&self) -> &'static str {
        if self.bot {
            "bot"
        } else if self.mobile {
            "mobile"
        } else if self.tablet {
            "tablet"
        } else if self.desktop {
            "desktop"
        } else {
            "web"
        }
    }
}

/// An endpoint instance belonging to a client app. Ephemeral per request
/// when no `id` is supplied by the client; persisted only as part of a
/// session.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Device {
    pub id: String,
    pub user_agent: UserAgentInfo,
    pub remote_addr: Option<IpAddr>,
    pub push: Option<PushSubscription>,
}

impl Device {
    /// Stable fingerprint of the device class, OS, and UA name — used to
    /// label sessions in listings without re-exposing the full UA string.
    pub fn hash(&self) -> String {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let bits: u8 = (self.user_agent.mobile as u8)
            | ((self.user_agent.tablet as u8) << 1)
            | ((self.user_agent.desktop as u8) << 2)
            | ((self.user_agent.bot as u8) << 3);
        let mut hasher = DefaultHasher::new();
        bits.hash(&mut hasher);
        self.id.hash(&mut hasher);
        self.user_agent.os.hash(&mut hasher);
        self.user_agent.name.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }

    pub fn kind(&self) -> &'static str {
        self.user_agent.kind()
    }

    /// Human-friendly label: `"{device} ({app}[/{version}][; {os}[ {os_version}]])"`.
    pub fn session_name(&self) -> String {
        let mut label = String::new();
        if !self.user_agent.device.is_empty() {
            label.push_str(&self.user_agent.device);
            label.push(' ');
        }
        label.push('(');
        label.push_str(if self.user_agent.name.is_empty() {
            "unknown"
        } else {
            &self.user_agent.name
        });
        if !self.user_agent.version.is_empty() {
            label.push('/');
            label.push_str(&self.user_agent.version);
        }
        if !self.user_agent.os.is_empty() {
            label.push_str("; ");
            label.push_str(&self.user_agent.os);
            if !self.user_agent.os_version.is_empty() {
                label.push(' ');
                label.push_str(&self.user_agent.os_version);
            }
        }
        label.push(')');
        label
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.session_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_name_formats_with_os_and_version() {
        let device = Device {
            id: "D1".into(),
            user_agent: UserAgentInfo {
                name: "Webitel".into(),
                version: "3.1".into(),
                os: "Android".into(),
                os_version: "14".into(),
                device: "Pixel 8".into(),
                mobile: true,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(device.session_name(), "Pixel 8 (Webitel/3.1; Android 14)");
        assert_eq!(device.kind(), "mobile");
    }

    #[test]
    fn hash_is_stable_for_same_input() {
        let device = Device {
            id: "D1".into(),
            ..Default::default()
        };
        assert_eq!(device.hash(), device.hash());
    }
}
