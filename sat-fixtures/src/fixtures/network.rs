//! The provisioning VLAN: capsule, domain and subnet on the target satellite.

use std::{fmt, net::Ipv4Addr};

use sat_client::host::Satellite;
use sat_shared::{
    broker::{BrokerRequest, ProvisioningNetworkOutput, data_out},
    entities::{Domain, DomainSpec, EntityKind, SmartProxy, Subnet, SubnetSpec},
};

use super::{session_location, session_sca_manifest_org, session_target_sat};
use crate::{
    helpers::{FixtureError, FixtureResult, ensure_status, gen_alpha, gen_dns_label},
    scope::{FixtureContext, ResourceKind, ScopeLevel},
};

pub const CONFIGURE_PROVISIONING_WORKFLOW: &str = "configure-install-sat-provisioning-rhv";

const DHCP_BLACKLIST_WORKAROUND: &str =
    "echo ':blacklist_duration_minutes: 2' >> /etc/foreman-proxy/settings.d/dhcp_isc.yml";

/// What the provisioning content is for. Discovery only needs kickstart trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProvisioningType {
    #[default]
    Standard,
    Discovery,
}

impl fmt::Display for ProvisioningType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProvisioningType::Standard => "standard",
            ProvisioningType::Discovery => "discovery",
        })
    }
}

/// A satellite wired into the provisioning VLAN.
#[derive(Debug, Clone)]
pub struct ProvisioningSat {
    pub sat: Satellite,
    pub domain: Domain,
    pub subnet: Subnet,
    pub provisioning_type: ProvisioningType,
}

/// Subnet parameters derived from the broker's network artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkPlan {
    pub network: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub gateway: String,
    pub from: String,
    pub to: String,
    pub dns_primary: String,
    pub dns_secondary: Option<String>,
}

impl NetworkPlan {
    /// The last upstream resolver is primary and the one before it secondary.
    pub fn from_output(output: ProvisioningNetworkOutput) -> FixtureResult<Self> {
        let (address, prefix) = parse_interface(&output.provisioning_addr_ipv4)?;
        let mask = prefix_mask(prefix);
        let network = Ipv4Addr::from(u32::from(address) & u32::from(mask));

        let mut upstream = output.provisioning_upstream_dns;
        let dns_primary = upstream.pop().ok_or_else(|| {
            FixtureError::Setup("broker returned no upstream DNS for the provisioning network".into())
        })?;
        let dns_secondary = upstream.pop();

        Ok(Self {
            network,
            mask,
            gateway: output.provisioning_gw_ipv4,
            from: output.provisioning_host_range_start,
            to: output.provisioning_host_range_end,
            dns_primary,
            dns_secondary,
        })
    }
}

/// `a.b.c.d/len`; a bare address is a /32.
fn parse_interface(cidr: &str) -> FixtureResult<(Ipv4Addr, u8)> {
    let invalid = || FixtureError::Setup(format!("invalid provisioning interface address '{cidr}'"));
    let (addr, prefix) = match cidr.split_once('/') {
        Some((addr, prefix)) => (addr, prefix.parse::<u8>().map_err(|_| invalid())?),
        None => (cidr, 32),
    };
    if prefix > 32 {
        return Err(invalid());
    }
    Ok((addr.trim().parse().map_err(|_| invalid())?, prefix))
}

fn prefix_mask(prefix: u8) -> Ipv4Addr {
    match prefix {
        0 => Ipv4Addr::UNSPECIFIED,
        p => Ipv4Addr::from(u32::MAX << (32 - u32::from(p))),
    }
}

/// The satellite's own capsule, serving the session location.
///
/// Its previous location list is put back when the session closes.
pub async fn session_provisioning_capsule(ctx: &mut FixtureContext) -> FixtureResult<SmartProxy> {
    let key = ResourceKind::ProvisioningCapsule;
    if let Some(capsule) = ctx.cached(ScopeLevel::Session, &key)? {
        return Ok(capsule);
    }
    let sat = session_target_sat(ctx).await?;
    let location = session_location(ctx).await?;

    let api = sat.api().clone();
    let proxy = api.default_smart_proxy().await?;
    let previous: Vec<_> = proxy.locations.iter().map(|l| l.id).collect();
    let capsule = api
        .update_smart_proxy_locations(proxy.id, &[location.id])
        .await?;
    tracing::info!("Capsule {} now serves location {}", capsule.name, location.name);

    let proxy_id = capsule.id;
    ctx.defer(
        ScopeLevel::Session,
        format!("restore locations of capsule {}", capsule.name),
        move || async move {
            api.update_smart_proxy_locations(proxy_id, &previous).await?;
            Ok(())
        },
    )?;
    ctx.store(ScopeLevel::Session, key, capsule)
}

/// The target satellite configured to provision hosts on the broker's VLAN:
/// network artifacts from the broker, then a domain and a DHCP subnet served
/// by the capsule.
///
/// Built once per session for the context's provisioning type.
pub async fn session_provisioning_sat(ctx: &mut FixtureContext) -> FixtureResult<ProvisioningSat> {
    let key = ResourceKind::ProvisioningSat;
    if let Some(prov) = ctx.cached(ScopeLevel::Session, &key)? {
        return Ok(prov);
    }
    let provisioning_type = ctx.provisioning_type();
    let sat = session_target_sat(ctx).await?;
    let org = session_sca_manifest_org(ctx).await?;
    let location = session_location(ctx).await?;
    let capsule = session_provisioning_capsule(ctx).await?;
    let vlan_id = ctx.settings().provisioning.vlan_id;

    // 1. Wire the satellite into the VLAN
    let dns_zone = format!("{}.foo", gen_dns_label(10));
    tracing::info!("Configuring provisioning on {} (VLAN {}, zone {})", sat.hostname, vlan_id, dns_zone);
    let request = BrokerRequest::workflow(CONFIGURE_PROVISIONING_WORKFLOW)
        .arg("artifacts", "last")
        .arg("target_vlan_id", vlan_id)
        .arg("target_host", sat.name.as_str())
        .arg("provisioning_dns_zone", dns_zone.as_str())
        .arg("sat_version", sat.broker_version());
    let output = ctx.broker().execute(&request).await?;
    let plan = NetworkPlan::from_output(data_out(&output)?)?;
    tracing::debug!("Provisioning network: {:?}", plan);

    let api = sat.api().clone();

    // 2. Domain
    let domain = api
        .create_domain(&DomainSpec {
            name: dns_zone,
            dns_id: Some(capsule.id),
            location_ids: vec![location.id],
            organization_ids: vec![org.id],
        })
        .await?;
    ctx.defer_delete(ScopeLevel::Session, api.clone(), EntityKind::Domain, domain.id, &domain.name)?;

    // 3. Subnet, every role on the capsule
    let subnet = api
        .create_subnet(&SubnetSpec {
            name: gen_alpha(10),
            network: plan.network.to_string(),
            mask: plan.mask.to_string(),
            gateway: plan.gateway,
            from: plan.from,
            to: plan.to,
            dns_primary: Some(plan.dns_primary),
            dns_secondary: plan.dns_secondary,
            boot_mode: "DHCP".to_string(),
            ipam: "DHCP".to_string(),
            dhcp_id: capsule.id,
            tftp_id: capsule.id,
            template_id: capsule.id,
            dns_id: capsule.id,
            httpboot_id: capsule.id,
            discovery_id: capsule.id,
            remote_execution_proxy_ids: vec![capsule.id],
            domain_ids: vec![domain.id],
            location_ids: vec![location.id],
            organization_ids: vec![org.id],
        })
        .await?;
    ctx.defer_delete(ScopeLevel::Session, api.clone(), EntityKind::Subnet, subnet.id, &subnet.name)?;
    tracing::info!("Subnet {} ({}/{}) on domain {}", subnet.name, subnet.network, subnet.mask, domain.name);

    // 4. Shorten the DHCP lease blacklist so reprovisioned MACs get addresses again
    ensure_status(DHCP_BLACKLIST_WORKAROUND, sat.execute(DHCP_BLACKLIST_WORKAROUND).await?)?;
    ensure_status("satellite-maintain service restart", sat.service_restart().await?)?;

    let prov = ProvisioningSat {
        sat,
        domain,
        subnet,
        provisioning_type,
    };
    ctx.store(ScopeLevel::Session, key, prov)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Fakes, network_output};
    use sat_client::shell::CommandOutput;
    use serde_json::json;

    fn output(addr: &str, dns: &[&str]) -> ProvisioningNetworkOutput {
        ProvisioningNetworkOutput {
            provisioning_addr_ipv4: addr.to_string(),
            provisioning_gw_ipv4: "192.168.10.1".to_string(),
            provisioning_host_range_start: "192.168.10.100".to_string(),
            provisioning_host_range_end: "192.168.10.200".to_string(),
            provisioning_upstream_dns: dns.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_plan_from_interface() {
        let plan = NetworkPlan::from_output(output("192.168.10.2/24", &["10.0.0.1", "10.0.0.2"])).unwrap();
        assert_eq!(plan.network, Ipv4Addr::new(192, 168, 10, 0));
        assert_eq!(plan.mask, Ipv4Addr::new(255, 255, 255, 0));
        assert_eq!(plan.dns_primary, "10.0.0.2");
        assert_eq!(plan.dns_secondary.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn test_plan_with_single_resolver_has_no_secondary() {
        let plan = NetworkPlan::from_output(output("172.16.5.77/20", &["10.0.0.53"])).unwrap();
        assert_eq!(plan.network, Ipv4Addr::new(172, 16, 0, 0));
        assert_eq!(plan.mask, Ipv4Addr::new(255, 255, 240, 0));
        assert_eq!(plan.dns_primary, "10.0.0.53");
        assert_eq!(plan.dns_secondary, None);
    }

    #[test]
    fn test_plan_without_resolvers_is_a_setup_error() {
        let err = NetworkPlan::from_output(output("192.168.10.2/24", &[])).unwrap_err();
        assert!(matches!(err, FixtureError::Setup(_)));
    }

    #[test]
    fn test_interface_parsing_edges() {
        assert_eq!(parse_interface("10.1.2.3").unwrap().1, 32);
        assert!(parse_interface("10.1.2.3/33").is_err());
        assert!(parse_interface("not-an-ip/24").is_err());
        assert_eq!(prefix_mask(0), Ipv4Addr::UNSPECIFIED);
        assert_eq!(prefix_mask(32), Ipv4Addr::BROADCAST);
    }

    #[tokio::test]
    async fn test_provisioning_sat_builds_domain_and_subnet() {
        let fakes = Fakes::new();
        fakes.broker.respond(CONFIGURE_PROVISIONING_WORKFLOW, network_output());
        let mut ctx = fakes.context();
        ctx.open(ScopeLevel::Session, "session").unwrap();

        let prov = session_provisioning_sat(&mut ctx)
            .await
            .unwrap();
        assert!(prov.domain.name.ends_with(".foo"));
        assert_eq!(prov.subnet.network, "192.168.10.0");
        assert_eq!(prov.subnet.mask, "255.255.255.0");
        assert_eq!(prov.subnet.dns_primary.as_deref(), Some("10.0.0.2"));

        let request = fakes.broker.executed(CONFIGURE_PROVISIONING_WORKFLOW).unwrap();
        assert_eq!(request.get("target_vlan_id"), Some(&json!(400)));
        assert_eq!(request.get("sat_version"), Some(&json!("6.16.0")));
        assert_eq!(
            request.get("provisioning_dns_zone"),
            Some(&json!(prov.domain.name))
        );

        let commands = fakes.shell.commands();
        assert!(commands[0].contains(":blacklist_duration_minutes: 2"));
        assert_eq!(commands[1], "satellite-maintain service restart");

        // second request is served from the session cache
        session_provisioning_sat(&mut ctx)
            .await
            .unwrap();
        assert_eq!(fakes.broker.executed_count(CONFIGURE_PROVISIONING_WORKFLOW), 1);

        ctx.close(ScopeLevel::Session).await.unwrap();
        let deleted = fakes.api.deleted();
        let subnet_at = deleted.iter().position(|d| d.0 == EntityKind::Subnet).unwrap();
        let domain_at = deleted.iter().position(|d| d.0 == EntityKind::Domain).unwrap();
        assert!(subnet_at < domain_at);
        assert_eq!(fakes.api.smart_proxy_location_ids(), Vec::<u64>::new());
    }

    #[tokio::test]
    async fn test_failed_service_restart_aborts() {
        let fakes = Fakes::new();
        fakes.broker.respond(CONFIGURE_PROVISIONING_WORKFLOW, network_output());
        fakes.shell.respond(
            "satellite-maintain service restart",
            CommandOutput {
                status: 1,
                stdout: String::new(),
                stderr: "dhcpd failed".into(),
            },
        );
        let mut ctx = fakes.context();
        ctx.open(ScopeLevel::Session, "session").unwrap();

        let err = session_provisioning_sat(&mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, FixtureError::Command { status: 1, .. }));
        let prov: Option<ProvisioningSat> = ctx
            .cached(ScopeLevel::Session, &ResourceKind::ProvisioningSat)
            .unwrap();
        assert!(prov.is_none());

        // what was created before the failure is still cleaned up
        ctx.close(ScopeLevel::Session).await.unwrap();
        assert!(fakes.api.deleted().iter().any(|d| d.0 == EntityKind::Domain));
    }

    #[tokio::test]
    async fn test_broker_output_without_data_out_is_a_setup_error() {
        let fakes = Fakes::new();
        fakes.broker.respond(CONFIGURE_PROVISIONING_WORKFLOW, json!({"status": "ok"}));
        let mut ctx = fakes.context();
        ctx.open(ScopeLevel::Session, "session").unwrap();

        let err = session_provisioning_sat(&mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, FixtureError::Setup(_)));
    }
}
