use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use imcore_types::{Application, Device, UserAgentInfo};

use crate::context::{headers, RequestContext};
use crate::error::CoreError;

/// Derives a `Device` fingerprint from request headers and peer address.
pub struct DeviceResolver;

impl DeviceResolver {
    pub fn resolve(ctx: &RequestContext) -> Device {
        let id = ctx.device_id_header().trim().to_string();
        let user_agent = parse_user_agent(ctx.header.get(headers::USER_AGENT));
        let remote_addr = resolve_remote_addr(ctx);
        Device {
            id,
            user_agent,
            remote_addr,
            push: None,
        }
    }

    pub fn require_device_id(device: &Device) -> Result<(), CoreError> {
        if device.id.is_empty() {
            return Err(CoreError::unauthorized_client("messaging: device required"));
        }
        Ok(())
    }

    /// Checks `device` against `app`'s `ClientConstraints`. Any non-empty
    /// constraint set that rejects the device yields `UNAUTHORIZED_CLIENT
    /// device not authorized`; an empty constraint set imposes no
    /// restriction on that dimension.
    pub fn authorize(ctx: &RequestContext, app: &Application, device: &Device) -> Result<(), CoreError> {
        let constraints = &app.constraints;

        if !constraints.user_agents.is_empty()
            && !constraints
                .user_agents
                .iter()
                .any(|pattern| user_agent_matches(&device.user_agent.name, pattern))
        {
            return Err(CoreError::unauthorized_client("messaging: device not authorized"));
        }

        if !constraints.networks.is_empty() {
            let allowed = device
                .remote_addr
                .is_some_and(|addr| constraints.networks.iter().any(|net| addr_in_network(addr, net)));
            if !allowed {
                return Err(CoreError::unauthorized_client("messaging: device not authorized"));
            }
        }

        let origin = ctx.header.get(headers::ORIGIN);
        if !constraints.origins.is_empty()
            && !origin.is_empty()
            && !constraints.origins.iter().any(|allowed| allowed == origin)
        {
            return Err(CoreError::unauthorized_client("messaging: device not authorized"));
        }

        Ok(())
    }
}

/// Matches a `ClientConstraints.user_agents` pattern against the parsed UA
/// name: a trailing `*` makes it a case-insensitive prefix match, otherwise
/// it's a case-insensitive substring match.
fn user_agent_matches(name: &str, pattern: &str) -> bool {
    let name = name.to_lowercase();
    match pattern.strip_suffix('*') {
        Some(prefix) => name.starts_with(&prefix.to_lowercase()),
        None => name.contains(&pattern.to_lowercase()),
    }
}

/// `network` is either a bare address (exact match) or a `addr/prefix` CIDR.
fn addr_in_network(addr: IpAddr, network: &str) -> bool {
    match network.split_once('/') {
        Some((base, prefix_len)) => match (base.parse::<IpAddr>(), prefix_len.parse::<u32>()) {
            (Ok(base), Ok(prefix_len)) => match (addr, base) {
                (IpAddr::V4(addr), IpAddr::V4(base)) => {
                    ipv4_masked_eq(addr, base, prefix_len.min(32))
                }
                (IpAddr::V6(addr), IpAddr::V6(base)) => {
                    ipv6_masked_eq(addr, base, prefix_len.min(128))
                }
                _ => false,
            },
            _ => false,
        },
        None => network.parse::<IpAddr>().is_ok_and(|exact| exact == addr),
    }
}

fn ipv4_masked_eq(a: Ipv4Addr, b: Ipv4Addr, prefix_len: u32) -> bool {
    let mask = if prefix_len == 0 { 0 } else { u32::MAX << (32 - prefix_len) };
    u32::from(a) & mask == u32::from(b) & mask
}

fn ipv6_masked_eq(a: Ipv6Addr, b: Ipv6Addr, prefix_len: u32) -> bool {
    let mask = if prefix_len == 0 { 0 } else { u128::MAX << (128 - prefix_len) };
    u128::from(a) & mask == u128::from(b) & mask
}

/// `X-Forwarded-For` (leftmost candidate, split on the first comma only),
/// else `X-Real-IP`, else the transport peer address.
fn resolve_remote_addr(ctx: &RequestContext) -> Option<IpAddr> {
    parse_forwarded_for(ctx.header.get(headers::FORWARDED_FOR))
        .or_else(|| parse_real_ip(ctx.header.get(headers::REAL_IP)))
        .or_else(|| ctx.peer.map(|p| p.ip()))
}

fn parse_forwarded_for(raw: &str) -> Option<IpAddr> {
    if raw.is_empty() {
        return None;
    }
    let leftmost = raw.splitn(2, ',').next().unwrap_or("").trim();
    parse_addr_or_addr_port(leftmost)
}

fn parse_real_ip(raw: &str) -> Option<IpAddr> {
    if raw.is_empty() {
        return None;
    }
    parse_addr_or_addr_port(raw.trim())
}

fn parse_addr_or_addr_port(input: &str) -> Option<IpAddr> {
    if let Ok(addr) = input.parse::<IpAddr>() {
        return Some(addr);
    }
    if let Ok(addr) = input.parse::<SocketAddr>() {
        return Some(addr.ip());
    }
    None
}

/// Small table-driven heuristic classifier — no dedicated UA-parsing crate
/// is pulled in by any teacher/example repo, so this is hand-rolled in
/// their idiom rather than a fabricated dependency (see DESIGN.md).
fn parse_user_agent(raw: &str) -> UserAgentInfo {
    if raw.is_empty() {
        return UserAgentInfo::default();
    }
    let lower = raw.to_lowercase();
    let bot = ["bot", "spider", "crawler", "curl", "wget"]
        .iter()
        .any(|needle| lower.contains(needle));
    let mobile = !bot && (lower.contains("mobile") || lower.contains("iphone") || lower.contains("android"));
    let tablet = !bot && !mobile && (lower.contains("ipad") || lower.contains("tablet"));
    let desktop = !bot && !mobile && !tablet;

    let os = if lower.contains("android") {
        "Android"
    } else if lower.contains("iphone") || lower.contains("ipad") || lower.contains("ios") {
        "iOS"
    } else if lower.contains("windows") {
        "Windows"
    } else if lower.contains("mac os") || lower.contains("macos") {
        "macOS"
    } else if lower.contains("linux") {
        "Linux"
    } else {
        ""
    };

    let (name, version) = extract_product(raw);

    UserAgentInfo {
        raw: raw.to_string(),
        name,
        version,
        os: os.to_string(),
        os_version: String::new(),
        device: String::new(),
        mobile,
        tablet,
        desktop,
        bot,
    }
}

/// Extracts the last `Token/Version` pair from a UA string. Real UA
/// strings stack `Product/Version` tokens from most-generic (`Mozilla/5.0`)
/// to most-specific (the actual client); taking the last one is close
/// enough to identify the client application without a full grammar.
fn extract_product(raw: &str) -> (String, String) {
    let mut found = None;
    for token in raw.split_whitespace() {
        if let Some((name, version)) = token.split_once('/') {
            if !name.is_empty() && version.chars().next().is_some_and(|c| c.is_ascii_digit()) {
                found = Some((name.to_string(), version.to_string()));
            }
        }
    }
    found.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HeaderBag;

    fn ctx_with_headers(pairs: &[(&str, &str)]) -> RequestContext {
        let mut header = HeaderBag::new();
        for (k, v) in pairs {
            header.insert(k, *v);
        }
        RequestContext::new(0, 1, header, None)
    }

    #[test]
    fn forwarded_for_takes_leftmost_before_first_comma() {
        let ctx = ctx_with_headers(&[("X-Forwarded-For", "203.0.113.195, 70.41.3.18, 150.172.238.178")]);
        let device = DeviceResolver::resolve(&ctx);
        assert_eq!(device.remote_addr, Some("203.0.113.195".parse().unwrap()));
    }

    #[test]
    fn forwarded_for_falls_back_to_real_ip() {
        let ctx = ctx_with_headers(&[("X-Real-IP", "188.230.65.211:41718")]);
        let device = DeviceResolver::resolve(&ctx);
        assert_eq!(device.remote_addr, Some("188.230.65.211".parse().unwrap()));
    }

    #[test]
    fn falls_back_to_peer_address() {
        let mut ctx = ctx_with_headers(&[]);
        ctx.peer = Some("10.0.0.5:443".parse().unwrap());
        let device = DeviceResolver::resolve(&ctx);
        assert_eq!(device.remote_addr, Some("10.0.0.5".parse().unwrap()));
    }

    #[test]
    fn classifies_mobile_android() {
        let ctx = ctx_with_headers(&[(
            "user-agent",
            "Mozilla/5.0 (Linux; Android 14) Webitel/3.1 Mobile",
        )]);
        let device = DeviceResolver::resolve(&ctx);
        assert_eq!(device.user_agent.os, "Android");
        assert!(device.user_agent.mobile);
        assert_eq!(device.user_agent.name, "Webitel");
        assert_eq!(device.user_agent.version, "3.1");
    }

    fn app_with_constraints(constraints: imcore_types::ClientConstraints) -> Application {
        Application {
            dc: 1,
            id: uuid::Uuid::new_v4(),
            client_id: "A1".into(),
            name: "App".into(),
            about: None,
            constraints,
            created_at: time::OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn authorize_passes_when_constraints_are_empty() {
        let ctx = ctx_with_headers(&[]);
        let app = app_with_constraints(Default::default());
        let device = DeviceResolver::resolve(&ctx);
        assert!(DeviceResolver::authorize(&ctx, &app, &device).is_ok());
    }

    #[test]
    fn authorize_rejects_unlisted_user_agent() {
        let ctx = ctx_with_headers(&[("user-agent", "Mozilla/5.0 curl/8.0")]);
        let app = app_with_constraints(imcore_types::ClientConstraints {
            user_agents: vec!["Webitel".into()],
            ..Default::default()
        });
        let device = DeviceResolver::resolve(&ctx);
        let err = DeviceResolver::authorize(&ctx, &app, &device).unwrap_err();
        assert_eq!(err.kind, crate::error::CoreErrorKind::UnauthorizedClient);
    }

    #[test]
    fn authorize_accepts_user_agent_prefix_match() {
        let ctx = ctx_with_headers(&[("user-agent", "Mozilla/5.0 Webitel/3.1 Mobile")]);
        let app = app_with_constraints(imcore_types::ClientConstraints {
            user_agents: vec!["Web*".into()],
            ..Default::default()
        });
        let device = DeviceResolver::resolve(&ctx);
        assert!(DeviceResolver::authorize(&ctx, &app, &device).is_ok());
    }

    #[test]
    fn authorize_rejects_address_outside_network() {
        let mut ctx = ctx_with_headers(&[]);
        ctx.peer = Some("10.0.0.5:443".parse().unwrap());
        let app = app_with_constraints(imcore_types::ClientConstraints {
            networks: vec!["192.168.0.0/16".into()],
            ..Default::default()
        });
        let device = DeviceResolver::resolve(&ctx);
        let err = DeviceResolver::authorize(&ctx, &app, &device).unwrap_err();
        assert_eq!(err.kind, crate::error::CoreErrorKind::UnauthorizedClient);
    }

    #[test]
    fn authorize_accepts_address_inside_network() {
        let mut ctx = ctx_with_headers(&[]);
        ctx.peer = Some("10.0.5.9:443".parse().unwrap());
        let app = app_with_constraints(imcore_types::ClientConstraints {
            networks: vec!["10.0.0.0/8".into()],
            ..Default::default()
        });
        let device = DeviceResolver::resolve(&ctx);
        assert!(DeviceResolver::authorize(&ctx, &app, &device).is_ok());
    }

    #[test]
    fn authorize_rejects_disallowed_origin() {
        let ctx = ctx_with_headers(&[("origin", "https://evil.example")]);
        let app = app_with_constraints(imcore_types::ClientConstraints {
            origins: vec!["https://app.example".into()],
            ..Default::default()
        });
        let device = DeviceResolver::resolve(&ctx);
        let err = DeviceResolver::authorize(&ctx, &app, &device).unwrap_err();
        assert_eq!(err.kind, crate::error::CoreErrorKind::UnauthorizedClient);
    }

    #[test]
    fn authorize_ignores_origin_constraint_when_header_absent() {
        let ctx = ctx_with_headers(&[]);
        let app = app_with_constraints(imcore_types::ClientConstraints {
            origins: vec!["https://app.example".into()],
            ..Default::default()
        });
        let device = DeviceResolver::resolve(&ctx);
        assert!(DeviceResolver::authorize(&ctx, &app, &device).is_ok());
    }
}
