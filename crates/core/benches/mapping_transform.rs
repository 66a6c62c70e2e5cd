use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use crmsync_core::MapperRegistry;
use crmsync_domain::{
    ContactMappingConfig, CustomerMappingConfig, EntityMappingConfig, OpportunityMappingConfig,
    ProbabilityEncoding, ProbabilityFieldConfig, RawFieldBag,
};

fn customers() -> Vec<CustomerMappingConfig> {
    (0..50)
        .map(|idx| CustomerMappingConfig {
            customer_id: format!("user{idx}"),
            provider_name: "salesforce".to_string(),
            mappings: vec![
                EntityMappingConfig::Contact(ContactMappingConfig {
                    object: "Contact".to_string(),
                    first_name: Some("FirstName".to_string()),
                    last_name: Some("LastName".to_string()),
                    required_fields: Vec::new(),
                }),
                EntityMappingConfig::Opportunity(OpportunityMappingConfig {
                    object: "Opportunity".to_string(),
                    name: Some("Name".to_string()),
                    description: Some("Description".to_string()),
                    probability: Some(ProbabilityFieldConfig {
                        field: "ProbabilityV2__c".to_string(),
                        encoding: ProbabilityEncoding::PercentPicklist,
                    }),
                    amount: Some("Amount".to_string()),
                    required_fields: Vec::new(),
                }),
            ],
        })
        .collect()
}

fn opportunity_batch(size: usize) -> Vec<RawFieldBag> {
    (0..size)
        .map(|idx| {
            RawFieldBag::new()
                .with("Name", format!("Opportunity {idx}"))
                .with("Description", "Benchmark opportunity")
                .with("ProbabilityV2__c", format!("{}", idx % 101))
                .with("Amount", idx as f64 * 12.5)
        })
        .collect()
}

fn mapping_benchmark(c: &mut Criterion) {
    let registry = MapperRegistry::from_configs(&customers()).expect("registry");

    let mut group = c.benchmark_group("mapping");
    group.sample_size(50);

    group.bench_function("resolve", |b| {
        b.iter(|| registry.resolve(black_box("salesforce"), black_box("user37"), black_box("Opportunity")));
    });

    let mapper = registry.resolve("salesforce", "user0", "Opportunity").expect("mapper");
    group.bench_function("transform_batch_1000", |b| {
        b.iter_batched(
            || opportunity_batch(1_000),
            |batch| {
                for raw in &batch {
                    black_box(mapper.transform.transform(raw).expect("transform"));
                }
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(core_benchmarks, mapping_benchmark);
criterion_main!(core_benchmarks);
