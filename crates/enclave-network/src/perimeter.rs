//! Private network perimeter
//!
//! A VPC split into per-zone subnets. Public subnets exist only to host NAT
//! gateways; every workload subnet's default route goes through the NAT
//! gateway of its zone. Flow logs for all traffic go to a key-encrypted sink.

use crate::cidr::{CidrAllocator, Ipv4Cidr};
use crate::endpoint::{Endpoint, EndpointService};
use enclave_core::{
    Arn, ArnContext, ConfigurationError, ConstructionError, IdentifierKind, IdentifierSource,
    Result,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Default VPC block
pub const DEFAULT_VPC_CIDR: &str = "10.0.0.0/16";
/// Default number of availability zones
pub const DEFAULT_MAX_ZONES: u8 = 2;
/// Upper bound on availability zones
pub const MAX_ZONES_LIMIT: u8 = 6;
/// Flow log retention
pub const FLOW_LOG_RETENTION_DAYS: u32 = 365;
/// Default flow log group name
pub const DEFAULT_FLOW_LOG_GROUP: &str = "/aws/vpc/flowlogs/SageMakerDomainStack";

/// What a subnet is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetRole {
    /// Hosts NAT gateways; routes to the internet gateway
    PublicEgress,
    /// Hosts workloads; reaches the internet only through NAT
    PrivateWithEgress,
}

/// One subnet group, instantiated once per zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetPlan {
    /// Group name
    pub name: String,
    /// Role
    pub role: SubnetRole,
    /// Prefix length of each subnet
    pub mask: u8,
}

impl SubnetPlan {
    /// Public egress group
    pub fn public_egress(name: impl Into<String>, mask: u8) -> Self {
        Self {
            name: name.into(),
            role: SubnetRole::PublicEgress,
            mask,
        }
    }

    /// Private workload group
    pub fn private_with_egress(name: impl Into<String>, mask: u8) -> Self {
        Self {
            name: name.into(),
            role: SubnetRole::PrivateWithEgress,
            mask,
        }
    }

    /// The default two-tier layout
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::public_egress("public_subnet_for_nat_gw", 24),
            Self::private_with_egress("workload_subnet_with_nat", 24),
        ]
    }
}

/// Network layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// VPC block
    pub cidr: Ipv4Cidr,
    /// Availability zones to spread subnets over
    pub max_zones: u8,
    /// Subnet groups
    pub subnets: Vec<SubnetPlan>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            cidr: Ipv4Cidr::parse(DEFAULT_VPC_CIDR).unwrap_or(Ipv4Cidr::any()),
            max_zones: DEFAULT_MAX_ZONES,
            subnets: SubnetPlan::defaults(),
        }
    }
}

impl NetworkConfig {
    /// Set the VPC block
    #[must_use]
    pub fn with_cidr(mut self, cidr: Ipv4Cidr) -> Self {
        self.cidr = cidr;
        self
    }

    /// Set the zone count
    #[must_use]
    pub fn with_max_zones(mut self, zones: u8) -> Self {
        self.max_zones = zones;
        self
    }

    /// Replace the subnet plan
    #[must_use]
    pub fn with_subnets(mut self, subnets: Vec<SubnetPlan>) -> Self {
        self.subnets = subnets;
        self
    }

    /// Check ranges and plan shape
    pub fn validate(&self) -> Result<()> {
        if self.cidr.is_any() {
            return Err(ConstructionError::invalid("network.cidr", "VPC block cannot be 0.0.0.0/0"));
        }
        if !(1..=MAX_ZONES_LIMIT).contains(&self.max_zones) {
            return Err(ConstructionError::invalid(
                "network.max_zones",
                format!("{} is outside 1..={MAX_ZONES_LIMIT}", self.max_zones),
            ));
        }
        let mut names = BTreeSet::new();
        for plan in &self.subnets {
            if !names.insert(plan.name.as_str()) {
                return Err(ConfigurationError::Duplicate {
                    what: "subnet group",
                    id: plan.name.clone(),
                }
                .into());
            }
            if plan.mask < self.cidr.prefix() || plan.mask > 28 {
                return Err(ConstructionError::invalid(
                    "network.subnets",
                    format!("/{} for '{}' does not fit {}", plan.mask, plan.name, self.cidr),
                ));
            }
        }
        let has = |role| self.subnets.iter().any(|p| p.role == role);
        if !has(SubnetRole::PrivateWithEgress) {
            return Err(ConstructionError::invalid(
                "network.subnets",
                "plan has no workload subnet group",
            ));
        }
        if !has(SubnetRole::PublicEgress) {
            return Err(ConstructionError::invalid(
                "network.subnets",
                "workload subnets need a public egress group for NAT",
            ));
        }
        Ok(())
    }
}

/// Traffic captured by flow logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrafficType {
    /// Accepted and rejected
    All,
}

/// Encrypted flow log destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowLogSink {
    log_group: String,
    key_arn: Arn,
    retention_days: u32,
    traffic_type: TrafficType,
}

impl FlowLogSink {
    /// Sink writing to `log_group`, encrypted with `key_arn`
    pub fn new(log_group: impl Into<String>, key_arn: Arn) -> Result<Self> {
        let log_group = log_group.into();
        if log_group.trim().is_empty() {
            return Err(ConstructionError::invalid("flow_log.log_group", "must not be empty"));
        }
        if key_arn.is_any() || key_arn.has_wildcard() || key_arn.service() != Some("kms") {
            return Err(ConstructionError::invalid(
                "flow_log.key",
                format!("'{key_arn}' is not a concrete key"),
            ));
        }
        Ok(Self {
            log_group,
            key_arn,
            retention_days: FLOW_LOG_RETENTION_DAYS,
            traffic_type: TrafficType::All,
        })
    }

    /// Log group name
    #[inline]
    #[must_use]
    pub fn log_group(&self) -> &str {
        &self.log_group
    }

    /// Encryption key
    #[inline]
    #[must_use]
    pub fn key_arn(&self) -> &Arn {
        &self.key_arn
    }

    /// Retention in days
    #[inline]
    #[must_use]
    pub fn retention_days(&self) -> u32 {
        self.retention_days
    }

    /// Captured traffic
    #[inline]
    #[must_use]
    pub fn traffic_type(&self) -> TrafficType {
        self.traffic_type
    }
}

/// Default route of a subnet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "target", content = "id", rename_all = "snake_case")]
pub enum DefaultRoute {
    /// Internet gateway of the VPC
    InternetGateway,
    /// NAT gateway in the same zone
    NatGateway(String),
}

/// A subnet in one zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subnet {
    /// Allocated id
    pub id: String,
    /// Group name
    pub group: String,
    /// Role
    pub role: SubnetRole,
    /// Zone index
    pub zone: u8,
    /// Address block
    pub cidr: Ipv4Cidr,
    /// Always false
    pub map_public_ip_on_launch: bool,
    /// Default route
    pub default_route: DefaultRoute,
}

/// A NAT gateway in a public subnet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NatGateway {
    /// Allocated id
    pub id: String,
    /// Hosting public subnet
    pub subnet_id: String,
    /// Zone index
    pub zone: u8,
}

/// The private network boundary
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkPerimeter {
    vpc_id: String,
    region: String,
    cidr: Ipv4Cidr,
    subnets: Vec<Subnet>,
    nat_gateways: Vec<NatGateway>,
    flow_log: FlowLogSink,
    trusted_groups: BTreeSet<String>,
    endpoints: IndexMap<EndpointService, Endpoint>,
}

/// Build the perimeter
pub fn create_network(
    ids: &dyn IdentifierSource,
    ctx: &ArnContext,
    config: &NetworkConfig,
    flow_log: FlowLogSink,
) -> Result<NetworkPerimeter> {
    config.validate()?;

    let vpc_id = ids.allocate(IdentifierKind::Vpc, "sagemaker_vpc");
    let mut alloc = CidrAllocator::new(config.cidr);
    let mut subnets = Vec::new();
    let mut nat_gateways = Vec::new();

    // Public groups first so every workload subnet has a NAT to route to.
    let mut plans: Vec<&SubnetPlan> = config.subnets.iter().collect();
    plans.sort_by_key(|p| p.role != SubnetRole::PublicEgress);

    for plan in plans {
        for zone in 0..config.max_zones {
            let cidr = alloc.next_block(plan.mask)?;
            let logical = format!("{}-{zone}", plan.name);
            let id = ids.allocate(IdentifierKind::Subnet, &logical);
            let default_route = match plan.role {
                SubnetRole::PublicEgress => {
                    if !nat_gateways.iter().any(|n: &NatGateway| n.zone == zone) {
                        nat_gateways.push(NatGateway {
                            id: ids.allocate(IdentifierKind::NatGateway, &logical),
                            subnet_id: id.clone(),
                            zone,
                        });
                    }
                    DefaultRoute::InternetGateway
                }
                SubnetRole::PrivateWithEgress => {
                    let nat = nat_gateways.iter().find(|n| n.zone == zone).ok_or_else(|| {
                        ConstructionError::invalid(
                            "network.subnets",
                            format!("zone {zone} has no NAT gateway for '{}'", plan.name),
                        )
                    })?;
                    DefaultRoute::NatGateway(nat.id.clone())
                }
            };
            debug!(subnet = %id, group = %plan.name, zone, %cidr, "subnet planned");
            subnets.push(Subnet {
                id,
                group: plan.name.clone(),
                role: plan.role,
                zone,
                cidr,
                map_public_ip_on_launch: false,
                default_route,
            });
        }
    }

    info!(
        vpc = %vpc_id,
        cidr = %config.cidr,
        zones = config.max_zones,
        subnets = subnets.len(),
        flow_log_group = flow_log.log_group(),
        "network perimeter created"
    );

    Ok(NetworkPerimeter {
        vpc_id,
        region: ctx.region().to_string(),
        cidr: config.cidr,
        subnets,
        nat_gateways,
        flow_log,
        trusted_groups: BTreeSet::new(),
        endpoints: IndexMap::new(),
    })
}

impl NetworkPerimeter {
    /// VPC id
    #[inline]
    #[must_use]
    pub fn vpc_id(&self) -> &str {
        &self.vpc_id
    }

    /// Region the perimeter lives in
    #[inline]
    #[must_use]
    pub fn region(&self) -> &str {
        &self.region
    }

    /// VPC block
    #[inline]
    #[must_use]
    pub fn cidr(&self) -> Ipv4Cidr {
        self.cidr
    }

    /// All subnets
    #[must_use]
    pub fn subnets(&self) -> &[Subnet] {
        &self.subnets
    }

    /// Workload subnets in zone order
    pub fn workload_subnets(&self) -> impl Iterator<Item = &Subnet> + '_ {
        self.subnets
            .iter()
            .filter(|s| s.role == SubnetRole::PrivateWithEgress)
    }

    /// Ids of the workload subnets
    #[must_use]
    pub fn workload_subnet_ids(&self) -> Vec<String> {
        self.workload_subnets().map(|s| s.id.clone()).collect()
    }

    /// NAT gateways
    #[must_use]
    pub fn nat_gateways(&self) -> &[NatGateway] {
        &self.nat_gateways
    }

    /// Flow log sink
    #[inline]
    #[must_use]
    pub fn flow_log(&self) -> &FlowLogSink {
        &self.flow_log
    }

    /// Whether `group_id` was created inside this perimeter
    #[must_use]
    pub fn trusts(&self, group_id: &str) -> bool {
        self.trusted_groups.contains(group_id)
    }

    pub(crate) fn trust(&mut self, group_id: &str) {
        self.trusted_groups.insert(group_id.to_string());
    }

    /// Endpoints in creation order
    pub fn endpoints(&self) -> impl Iterator<Item = &Endpoint> + '_ {
        self.endpoints.values()
    }

    /// Endpoint for `service`, if added
    #[must_use]
    pub fn endpoint(&self, service: EndpointService) -> Option<&Endpoint> {
        self.endpoints.get(&service)
    }

    pub(crate) fn insert_endpoint(&mut self, endpoint: Endpoint) -> &Endpoint {
        self.endpoints.entry(endpoint.service).or_insert(endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enclave_core::{AccountId, DerivedIdentifiers};

    fn ctx() -> ArnContext {
        ArnContext::new(AccountId::new("111111111111").unwrap(), "us-east-1").unwrap()
    }

    fn sink(ctx: &ArnContext) -> FlowLogSink {
        FlowLogSink::new(DEFAULT_FLOW_LOG_GROUP, ctx.arn("kms", "key/abcd")).unwrap()
    }

    #[test]
    fn default_layout() {
        let ctx = ctx();
        let net = create_network(&DerivedIdentifiers::new(), &ctx, &NetworkConfig::default(), sink(&ctx))
            .unwrap();
        assert_eq!(net.subnets().len(), 4);
        assert_eq!(net.nat_gateways().len(), 2);
        assert!(net.subnets().iter().all(|s| !s.map_public_ip_on_launch));
        assert!(net.subnets().iter().all(|s| net.cidr().contains(&s.cidr)));
        assert_eq!(net.flow_log().retention_days(), 365);
    }

    #[test]
    fn workload_routes_through_zone_nat() {
        let ctx = ctx();
        let net = create_network(&DerivedIdentifiers::new(), &ctx, &NetworkConfig::default(), sink(&ctx))
            .unwrap();
        for subnet in net.workload_subnets() {
            let DefaultRoute::NatGateway(nat_id) = &subnet.default_route else {
                panic!("workload subnet routes to the internet gateway");
            };
            let nat = net.nat_gateways().iter().find(|n| &n.id == nat_id).unwrap();
            assert_eq!(nat.zone, subnet.zone);
        }
    }

    #[test]
    fn rejects_workload_without_public_egress() {
        let config = NetworkConfig::default()
            .with_subnets(vec![SubnetPlan::private_with_egress("workload", 24)]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zone_count_out_of_range() {
        assert!(NetworkConfig::default().with_max_zones(0).validate().is_err());
        assert!(NetworkConfig::default().with_max_zones(7).validate().is_err());
        assert!(NetworkConfig::default().with_max_zones(6).validate().is_ok());
    }

    #[test]
    fn rejects_plan_that_does_not_fit() {
        let ctx = ctx();
        let config = NetworkConfig::default()
            .with_cidr(Ipv4Cidr::parse("10.0.0.0/24").unwrap())
            .with_subnets(vec![
                SubnetPlan::public_egress("public", 25),
                SubnetPlan::private_with_egress("workload", 25),
            ]);
        assert!(create_network(&DerivedIdentifiers::new(), &ctx, &config, sink(&ctx)).is_err());
    }

    #[test]
    fn flow_log_requires_concrete_key() {
        assert!(FlowLogSink::new("/logs", Arn::any()).is_err());
        assert!(FlowLogSink::new("", ctx().arn("kms", "key/abcd")).is_err());
    }
}
