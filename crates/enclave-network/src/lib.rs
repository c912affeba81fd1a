//! Enclave Network
//!
//! The private network perimeter of a workspace:
//! - [`Ipv4Cidr`] and [`CidrAllocator`]: block arithmetic and subnet carving
//! - [`NetworkPerimeter`]: VPC, per-zone subnets, NAT, encrypted flow logs
//! - [`WorkloadSecurityGroup`]: default-deny groups with justified rules
//! - [`Endpoint`]: interface endpoints in the workload subnet

#![warn(unreachable_pub)]

pub mod cidr;
pub mod endpoint;
pub mod perimeter;
pub mod security_group;

pub use cidr::{CidrAllocator, Ipv4Cidr};
pub use endpoint::{add_endpoint, Endpoint, EndpointService};
pub use perimeter::{
    create_network, DefaultRoute, FlowLogSink, NatGateway, NetworkConfig, NetworkPerimeter,
    Subnet, SubnetPlan, SubnetRole, TrafficType, DEFAULT_FLOW_LOG_GROUP, DEFAULT_MAX_ZONES,
    DEFAULT_VPC_CIDR, FLOW_LOG_RETENTION_DAYS, MAX_ZONES_LIMIT,
};
pub use security_group::{
    apply_workspace_rules, create_security_group, Direction, Peer, Ports, SecurityGroupRule,
    WorkloadSecurityGroup,
};
