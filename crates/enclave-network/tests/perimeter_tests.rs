//! Perimeter integration tests

use enclave_core::{AccountId, ArnContext, DerivedIdentifiers, ErrorKind};
use enclave_network::*;
use proptest::prelude::*;

fn ctx() -> ArnContext {
    ArnContext::new(AccountId::new("111111111111").unwrap(), "us-east-1").unwrap()
}

fn perimeter(config: &NetworkConfig) -> NetworkPerimeter {
    let ctx = ctx();
    let sink = FlowLogSink::new(DEFAULT_FLOW_LOG_GROUP, ctx.arn("kms", "key/flow")).unwrap();
    create_network(&DerivedIdentifiers::new(), &ctx, config, sink).unwrap()
}

#[test]
fn workspace_endpoints_in_first_workload_subnet() {
    let ids = DerivedIdentifiers::new();
    let mut net = perimeter(&NetworkConfig::default());
    let mut group = create_security_group(&mut net, &ids, "sagemaker_workload_sg", "SageMaker Workload SG").unwrap();
    apply_workspace_rules(&mut group).unwrap();

    for service in EndpointService::workspace_set() {
        add_endpoint(&mut net, &ids, service, &group).unwrap();
    }
    let first = net.workload_subnet_ids()[0].clone();
    assert_eq!(net.endpoints().count(), 8);
    assert!(net.endpoints().all(|e| e.subnet_id == first && e.security_group_id == group.id()));

    let again = add_endpoint(&mut net, &ids, EndpointService::Kms, &group).unwrap();
    assert_eq!(&again, net.endpoint(EndpointService::Kms).unwrap());
    assert_eq!(net.endpoints().count(), 8);
}

#[test]
fn endpoint_rejects_untrusted_group() {
    let ids = DerivedIdentifiers::new();
    let mut net = perimeter(&NetworkConfig::default());
    let mut other = perimeter(&NetworkConfig::default());
    let mut group = create_security_group(&mut other, &DerivedIdentifiers::with_salt("other"), "foreign", "x").unwrap();
    apply_workspace_rules(&mut group).unwrap();

    let err = add_endpoint(&mut net, &ids, EndpointService::Athena, &group).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn endpoint_rejects_group_without_inbound_https() {
    let ids = DerivedIdentifiers::new();
    let mut net = perimeter(&NetworkConfig::default());
    let group = create_security_group(&mut net, &ids, "bare", "no rules").unwrap();
    assert!(add_endpoint(&mut net, &ids, EndpointService::Kms, &group).is_err());
}

#[test]
fn every_rule_peer_is_scoped() {
    let ids = DerivedIdentifiers::new();
    let mut net = perimeter(&NetworkConfig::default());
    let mut group = create_security_group(&mut net, &ids, "sg", "workload").unwrap();
    apply_workspace_rules(&mut group).unwrap();

    for rule in group.rules() {
        assert!(!rule.justification.trim().is_empty());
        match rule.peer {
            Peer::SelfGroup => {}
            Peer::AnyIpv4 => {
                assert_eq!(rule.direction, Direction::Outbound);
                assert!(rule.ports == Ports::tcp(80) || rule.ports == Ports::tcp(443));
            }
            Peer::Cidr(cidr) => assert!(net.cidr().contains(&cidr)),
        }
    }
}

proptest! {
    #[test]
    fn subnets_are_disjoint_and_inside_vpc(zones in 1u8..=6, public_mask in 20u8..=26, private_mask in 20u8..=26) {
        let config = NetworkConfig::default()
            .with_max_zones(zones)
            .with_subnets(vec![
                SubnetPlan::public_egress("public", public_mask),
                SubnetPlan::private_with_egress("workload", private_mask),
            ]);
        let net = perimeter(&config);
        let subnets = net.subnets();
        prop_assert_eq!(subnets.len(), usize::from(zones) * 2);
        for (i, a) in subnets.iter().enumerate() {
            prop_assert!(net.cidr().contains(&a.cidr));
            prop_assert!(!a.map_public_ip_on_launch);
            for b in &subnets[i + 1..] {
                prop_assert!(!a.cidr.overlaps(&b.cidr));
            }
        }
        prop_assert_eq!(net.nat_gateways().len(), usize::from(zones));
    }

    #[test]
    fn carved_blocks_stay_inside_parent(prefix in 8u8..=24, sub in 0u8..=8, index in 0u32..256) {
        let parent = Ipv4Cidr::parse("10.0.0.0/8").unwrap().subnet(prefix, 0).unwrap();
        let child_prefix = prefix + sub;
        match parent.subnet(child_prefix, index) {
            Ok(child) => prop_assert!(parent.contains(&child)),
            Err(_) => prop_assert!(u64::from(index) >= 1u64 << sub),
        }
    }
}
