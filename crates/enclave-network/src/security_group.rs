//! Default-deny workload security groups
//!
//! A group starts with no ingress and no egress. Every rule carries an audit
//! justification. The only rules with an unscoped peer are outbound TCP 80 and
//! 443; everything else is scoped to the group itself or to a block inside the
//! perimeter.

use crate::cidr::Ipv4Cidr;
use crate::perimeter::NetworkPerimeter;
use enclave_core::{
    require_justification, ConfigurationError, ConstructionError, IdentifierKind,
    IdentifierSource, PolicyScopeViolation, Result,
};
use serde::Serialize;
use std::fmt;
use tracing::debug;

const HTTP: u16 = 80;
const HTTPS: u16 = 443;
const IKE: u16 = 500;
const EPHEMERAL_LOW: u16 = 8192;

const MANAGED_SERVICE_REASON: &str = "Communication required with the managed service VPC";

/// Traffic direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Ingress
    Inbound,
    /// Egress
    Outbound,
}

/// The other end of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "cidr", rename_all = "snake_case")]
pub enum Peer {
    /// Members of the same group
    SelfGroup,
    /// Any IPv4 address
    AnyIpv4,
    /// A block inside the perimeter
    Cidr(Ipv4Cidr),
}

impl Peer {
    fn normalized(self) -> Self {
        match self {
            Self::Cidr(cidr) if cidr.is_any() => Self::AnyIpv4,
            other => other,
        }
    }
}

/// Protocol and port range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "protocol", rename_all = "lowercase")]
pub enum Ports {
    /// TCP ports `from..=to`
    Tcp {
        /// First port
        from: u16,
        /// Last port
        to: u16,
    },
    /// UDP ports `from..=to`
    Udp {
        /// First port
        from: u16,
        /// Last port
        to: u16,
    },
    /// IPsec ESP (no ports)
    Esp,
    /// Every protocol and port
    All,
}

impl Ports {
    /// Single TCP port
    #[must_use]
    pub const fn tcp(port: u16) -> Self {
        Self::Tcp { from: port, to: port }
    }

    /// TCP range
    #[must_use]
    pub const fn tcp_range(from: u16, to: u16) -> Self {
        Self::Tcp { from, to }
    }

    /// Single UDP port
    #[must_use]
    pub const fn udp(port: u16) -> Self {
        Self::Udp { from: port, to: port }
    }

    /// ESP
    #[must_use]
    pub const fn esp() -> Self {
        Self::Esp
    }

    /// Whether this spans every port of its protocol
    #[must_use]
    pub fn is_all_ports(&self) -> bool {
        match *self {
            Self::All => true,
            Self::Tcp { from, to } | Self::Udp { from, to } => from <= 1 && to == u16::MAX,
            Self::Esp => false,
        }
    }

    fn validate(&self) -> Result<()> {
        match *self {
            Self::Tcp { from, to } | Self::Udp { from, to } if from > to => Err(
                ConstructionError::invalid("ports", format!("range {from}-{to} is inverted")),
            ),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Ports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { from, to } if from == to => write!(f, "tcp/{from}"),
            Self::Tcp { from, to } => write!(f, "tcp/{from}-{to}"),
            Self::Udp { from, to } if from == to => write!(f, "udp/{from}"),
            Self::Udp { from, to } => write!(f, "udp/{from}-{to}"),
            Self::Esp => f.write_str("esp"),
            Self::All => f.write_str("all"),
        }
    }
}

/// A single allow rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroupRule {
    /// Direction
    pub direction: Direction,
    /// Peer
    pub peer: Peer,
    /// Protocol and ports
    pub ports: Ports,
    /// Audit justification
    pub justification: String,
}

impl fmt::Display for SecurityGroupRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let peer = match self.peer {
            Peer::SelfGroup => "self".to_string(),
            Peer::AnyIpv4 => "0.0.0.0/0".to_string(),
            Peer::Cidr(cidr) => cidr.to_string(),
        };
        let arrow = match self.direction {
            Direction::Inbound => "from",
            Direction::Outbound => "to",
        };
        write!(f, "{} {arrow} {peer}", self.ports)
    }
}

/// A default-deny group registered with its perimeter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadSecurityGroup {
    id: String,
    name: String,
    description: String,
    vpc_id: String,
    #[serde(skip)]
    perimeter_cidr: Ipv4Cidr,
    allow_all_outbound: bool,
    rules: Vec<SecurityGroupRule>,
}

/// Create an empty group inside `perimeter` and mark it trusted
pub fn create_security_group(
    perimeter: &mut NetworkPerimeter,
    ids: &dyn IdentifierSource,
    name: &str,
    description: &str,
) -> Result<WorkloadSecurityGroup> {
    if name.trim().is_empty() {
        return Err(ConstructionError::invalid("security_group.name", "must not be empty"));
    }
    let id = ids.allocate(IdentifierKind::SecurityGroup, name);
    perimeter.trust(&id);
    debug!(group = %id, name, vpc = perimeter.vpc_id(), "security group created");
    Ok(WorkloadSecurityGroup {
        id,
        name: name.to_string(),
        description: description.to_string(),
        vpc_id: perimeter.vpc_id().to_string(),
        perimeter_cidr: perimeter.cidr(),
        allow_all_outbound: false,
        rules: Vec::new(),
    })
}

impl WorkloadSecurityGroup {
    /// Group id
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Group name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Owning VPC
    #[inline]
    #[must_use]
    pub fn vpc_id(&self) -> &str {
        &self.vpc_id
    }

    /// Always false
    #[inline]
    #[must_use]
    pub fn allow_all_outbound(&self) -> bool {
        self.allow_all_outbound
    }

    /// Rules in insertion order
    #[must_use]
    pub fn rules(&self) -> &[SecurityGroupRule] {
        &self.rules
    }

    /// Rules in one direction
    pub fn rules_in(&self, direction: Direction) -> impl Iterator<Item = &SecurityGroupRule> + '_ {
        self.rules.iter().filter(move |r| r.direction == direction)
    }

    /// Accepts HTTPS from its own members (needed to front interface endpoints)
    #[must_use]
    pub fn accepts_https_from_self(&self) -> bool {
        self.rules_in(Direction::Inbound).any(|r| {
            r.peer == Peer::SelfGroup
                && matches!(r.ports, Ports::Tcp { from, to } if from <= HTTPS && HTTPS <= to)
        })
    }

    /// Add an allow rule
    ///
    /// Returns `false` if an identical rule already exists.
    pub fn allow(
        &mut self,
        direction: Direction,
        peer: Peer,
        ports: Ports,
        justification: &str,
    ) -> Result<bool> {
        let peer = peer.normalized();
        ports.validate()?;
        let candidate = SecurityGroupRule {
            direction,
            peer,
            ports,
            justification: String::new(),
        };
        let justification =
            require_justification(&format!("rule '{candidate}' on {}", self.name), justification)?;

        match peer {
            Peer::AnyIpv4 if ports.is_all_ports() => {
                return Err(ConstructionError::invalid(
                    "security_group.rule",
                    format!("'{candidate}' opens every port to any address"),
                ));
            }
            Peer::AnyIpv4 => {
                let web_egress = direction == Direction::Outbound
                    && (ports == Ports::tcp(HTTPS) || ports == Ports::tcp(HTTP));
                if !web_egress {
                    return Err(PolicyScopeViolation::UnscopedPeer {
                        rule: candidate.to_string(),
                    }
                    .into());
                }
            }
            Peer::Cidr(cidr) if !self.perimeter_cidr.contains(&cidr) => {
                return Err(ConfigurationError::InvalidValue {
                    field: "security_group.rule".to_string(),
                    reason: format!("peer {cidr} is outside the perimeter {}", self.perimeter_cidr),
                }
                .into());
            }
            Peer::Cidr(_) | Peer::SelfGroup => {}
        }

        let rule = SecurityGroupRule {
            justification,
            ..candidate
        };
        if self
            .rules
            .iter()
            .any(|r| r.direction == rule.direction && r.peer == rule.peer && r.ports == rule.ports)
        {
            return Ok(false);
        }
        debug!(group = %self.id, rule = %rule, "rule added");
        self.rules.push(rule);
        Ok(true)
    }
}

/// Install the workspace rule set
///
/// Managed-service traffic to and from the group itself, web egress, and
/// inbound HTTPS from the group for interface endpoints.
pub fn apply_workspace_rules(group: &mut WorkloadSecurityGroup) -> Result<()> {
    let managed = [
        Ports::tcp_range(EPHEMERAL_LOW, u16::MAX),
        Ports::udp(IKE),
        Ports::esp(),
    ];
    for ports in managed {
        group.allow(Direction::Outbound, Peer::SelfGroup, ports, MANAGED_SERVICE_REASON)?;
    }
    group.allow(
        Direction::Outbound,
        Peer::AnyIpv4,
        Ports::tcp(HTTPS),
        "Allow HTTPS outbound for egress-only internet access",
    )?;
    group.allow(
        Direction::Outbound,
        Peer::AnyIpv4,
        Ports::tcp(HTTP),
        "Allow HTTP outbound for egress-only internet access",
    )?;
    for ports in managed {
        group.allow(Direction::Inbound, Peer::SelfGroup, ports, MANAGED_SERVICE_REASON)?;
    }
    group.allow(
        Direction::Inbound,
        Peer::SelfGroup,
        Ports::tcp(HTTPS),
        "Allow HTTPS inbound for VPC interface endpoints",
    )?;
    Ok(())
}
