use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::{Duration, Utc};
use restgate_auth::{TokenConfig, TokenService, UserPermissions};
use restgate_core::{MethodId, ResourceId, UserId};
use restgate_infra::aggregator::{
    PathMethodRow, PermissionIdRow, ScanError, aggregate_ids, aggregate_paths_methods,
};

const METHODS: [&str; 4] = ["GET", "POST", "PUT", "DELETE"];

/// Sorted id rows: `resources` groups with every method granted on each.
fn id_rows(resources: i64) -> Vec<Result<PermissionIdRow, ScanError>> {
    (0..resources)
        .flat_map(|r| {
            (0..METHODS.len() as i64).map(move |m| {
                Ok(PermissionIdRow {
                    resource_id: ResourceId::new(r),
                    method_id: MethodId::new(m),
                })
            })
        })
        .collect()
}

fn path_rows(resources: i64) -> Vec<Result<PathMethodRow, ScanError>> {
    (0..resources)
        .flat_map(|r| {
            METHODS.iter().map(move |m| {
                Ok(PathMethodRow {
                    path: format!("/api/resource/{r}"),
                    method: (*m).to_string(),
                })
            })
        })
        .collect()
}

fn bench_grouping(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate_ids");

    for resources in [1, 10, 100, 1000].iter() {
        let rows = id_rows(*resources);
        group.throughput(Throughput::Elements(rows.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("group_sorted_rows", resources),
            resources,
            |b, &count| {
                b.iter(|| {
                    let groups = aggregate_ids(id_rows(count)).unwrap();
                    black_box(groups);
                });
            },
        );
    }

    group.finish();
}

fn bench_path_map(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate_paths_methods");

    for resources in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*resources as u64 * METHODS.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("fold_into_map", resources),
            resources,
            |b, &count| {
                b.iter(|| {
                    let map = aggregate_paths_methods(path_rows(count)).unwrap();
                    black_box(map);
                });
            },
        );
    }

    group.finish();
}

fn bench_token_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("token");
    let config = TokenConfig::new(
        b"bench-signing-secret".to_vec(),
        vec![7u8; 32],
        Some(Duration::minutes(30)),
    );
    let tokens = TokenService::new(&config);
    let user = UserId::new(42);

    for resources in [1, 50].iter() {
        let permissions =
            UserPermissions::from_rest(aggregate_paths_methods(path_rows(*resources)).unwrap());

        group.bench_with_input(
            BenchmarkId::new("generate", resources),
            &permissions,
            |b, permissions| {
                b.iter(|| black_box(tokens.generate(user, permissions).unwrap()));
            },
        );

        let token = tokens.generate_at(user, &permissions, Utc::now()).unwrap();
        group.bench_with_input(BenchmarkId::new("validate", resources), &token, |b, token| {
            b.iter(|| black_box(tokens.validate_permissions(token).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_grouping, bench_path_map, bench_token_round_trip);
criterion_main!(benches);
