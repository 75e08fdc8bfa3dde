//! Performance benchmarks for mesh-control
//!
//! Run with: cargo bench

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mesh_control::config::Config;
use mesh_control::fleet::{Agent, Fleet, Gateway, NodeKind, Tunnel};
use mesh_control::ipam::{allocate_block, AddressBlock, AllocationPolicy, TunnelAllocation};
use mesh_control::wireguard::{TopologyBuilder, TopologyOptions};
use std::collections::BTreeSet;

/// `agents` agents spread over `gateways` gateways, one tunnel each
fn build_fleet(agents: usize, gateways: usize) -> Fleet {
    let mut fleet = Fleet::new();

    for i in 0..gateways {
        let public_ip = format!("198.51.100.{}", i + 1);
        let mut gateway = Gateway::register(&format!("gw-{}", i), Some(public_ip), None);
        gateway.id = format!("g{}", i);
        gateway.wireguard_public_key = Some(BASE64.encode([i as u8; 32]));
        fleet.gateways.push(gateway);
    }

    for i in 0..agents {
        let mut agent = Agent::register(&format!("edge-{}", i));
        agent.id = format!("a{}", i);
        agent.wireguard_public_key = Some(BASE64.encode([(i + 100) as u8; 32]));

        let block = AddressBlock::new((i + 1) as u8).expect("block in range");
        let gateway_id = format!("g{}", i % gateways);
        fleet.tunnels.push(Tunnel::from_allocation(
            &agent.id,
            &gateway_id,
            &TunnelAllocation::for_block(block),
        ));
        fleet.agents.push(agent);
    }

    fleet
}

fn bench_allocate_block(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocate_block");

    for used_count in [0u8, 64, 200, 253] {
        let used: BTreeSet<u8> = (1..=used_count).collect();
        group.bench_with_input(
            BenchmarkId::from_parameter(used_count),
            &used,
            |b, used| {
                b.iter(|| allocate_block(black_box(used)));
            },
        );
    }

    group.finish();
}

fn bench_subnet_parse(c: &mut Criterion) {
    c.bench_function("subnet_parse", |b| {
        b.iter(|| AddressBlock::parse(black_box("10.123.0.0/24")));
    });
}

fn bench_used_block_numbers(c: &mut Criterion) {
    let fleet = build_fleet(250, 4);
    let policy = AllocationPolicy::default();

    c.bench_function("used_block_numbers", |b| {
        b.iter(|| policy.used_block_numbers(black_box(&fleet)));
    });
}

fn bench_topology(c: &mut Criterion) {
    let mut group = c.benchmark_group("topology");
    let builder = TopologyBuilder::new(TopologyOptions::default());

    for agents in [10usize, 100, 250] {
        let fleet = build_fleet(agents, 4);
        group.bench_with_input(BenchmarkId::new("gateway", agents), &fleet, |b, fleet| {
            b.iter(|| builder.build(NodeKind::Gateway, "g0", black_box(fleet)));
        });
        group.bench_with_input(BenchmarkId::new("agent", agents), &fleet, |b, fleet| {
            b.iter(|| builder.build(NodeKind::Agent, "a0", black_box(fleet)));
        });
    }

    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let fleet = build_fleet(250, 4);
    let topology = TopologyBuilder::new(TopologyOptions::default())
        .build(NodeKind::Gateway, "g0", &fleet)
        .expect("gateway exists");

    c.bench_function("render_gateway_config", |b| {
        b.iter(|| black_box(&topology).render());
    });
}

fn bench_config_parsing(c: &mut Criterion) {
    let toml_data = r#"
fleet_path = "/var/lib/mesh-control/fleet.json"

[wireguard]
listen_port = 51820
persistent_keepalive = 25

[topology]
allowed_ips_scope = "per_gateway"
"#;

    c.bench_function("config_parsing", |b| {
        b.iter(|| Config::parse(black_box(toml_data)));
    });
}

criterion_group!(
    benches,
    bench_allocate_block,
    bench_subnet_parse,
    bench_used_block_numbers,
    bench_topology,
    bench_render,
    bench_config_parsing
);
criterion_main!(benches);
