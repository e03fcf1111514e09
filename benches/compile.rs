//! Benchmark for the VolSpec batch compiler
//!
//! Target: a 4-controller, 96-disk machine compiles in well under a millisecond

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use drp_raid::inventory::{MediaType, Protocol};
use drp_raid::{ControllerRecord, DiskRecord, Inventory, VolSpecs};

const GB: u64 = 1 << 30;

fn controller(id: usize, disks: usize) -> ControllerRecord {
    let mut c = ControllerRecord {
        id: id.to_string(),
        driver: "megacli".to_string(),
        jbod_capable: true,
        raid_capable: true,
        ..Default::default()
    };
    c.pci.bus = id as i64;
    for slot in 0..disks as u64 {
        let (protocol, media_type, size) = match slot % 3 {
            0 => ("sas", "disk", 4000 * GB),
            1 => ("sata", "ssd", 960 * GB),
            _ => ("nvme", "ssd", 1920 * GB),
        };
        c.disks.push(DiskRecord {
            controller_id: c.id.clone(),
            controller_driver: c.driver.clone(),
            size,
            slot,
            protocol: Protocol::from(protocol),
            media_type: MediaType::from(media_type),
            status: "good".to_string(),
            ..Default::default()
        });
    }
    c
}

fn machine(controllers: usize, disks: usize) -> Inventory {
    Inventory::from_records((0..controllers).map(|i| controller(i, disks)).collect())
}

fn specs(controllers: usize) -> VolSpecs {
    let mut json = Vec::new();
    for c in 0..controllers {
        json.push(format!(
            r#"{{"Controller":{c},"RaidLevel":"raid1","DiskCount":"min","Size":"min","Type":"ssd"}}"#
        ));
        json.push(format!(r#"{{"Controller":{c},"RaidLevel":"raid60","DiskCount":"8"}}"#));
        json.push(format!(r#"{{"Controller":{c},"RaidLevel":"raid5","DiskCount":"max","Size":"max"}}"#));
        json.push(format!(r#"{{"Controller":{c},"RaidLevel":"jbod","DiskCount":"max"}}"#));
    }
    serde_json::from_str(&format!("[{}]", json.join(","))).unwrap_or_default()
}

fn bench_compile_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");

    let inventory = machine(4, 24);
    let wanted = specs(4);
    group.throughput(Throughput::Elements(wanted.len() as u64));

    group.bench_function("mixed_batch_96_disks", |b| {
        b.iter(|| black_box(wanted.compile(black_box(&inventory))));
    });

    group.finish();
}

fn bench_current_specs(c: &mut Criterion) {
    let mut group = c.benchmark_group("inventory");

    let inventory = machine(4, 24);
    group.throughput(Throughput::Elements(1));

    group.bench_function("to_volspecs_generic", |b| {
        b.iter(|| black_box(inventory.to_volspecs(black_box(false))));
    });

    group.finish();
}

criterion_group!(benches, bench_compile_batch, bench_current_specs);
criterion_main!(benches);
