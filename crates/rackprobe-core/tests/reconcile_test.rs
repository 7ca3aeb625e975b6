#![allow(clippy::unwrap_used)]

// Upsert-merge against the in-memory inventory.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use rackprobe_core::{
    CoreError, DeviceId, DeviceIdentity, DeviceType, DiskShare, DiskShareFact, DiskShareFacts,
    DiskShareMount, Ethernet, Inventory, MacAddress, MemoryInventory, Priority, Reconciler, Wwn,
};

const PRIORITY: Priority = Priority(5);

struct Fixture {
    reconciler: Reconciler,
    inventory: Arc<MemoryInventory>,
    device: DeviceId,
}

fn fixture(wwns: &[&str]) -> Fixture {
    let inventory = Arc::new(MemoryInventory::new());
    for wwn in wwns {
        inventory.register_share(DiskShare::new(Wwn::new(wwn)));
    }
    let reconciler = Reconciler::new(Arc::clone(&inventory) as Arc<dyn Inventory>);
    let device = reconciler
        .upsert_device(&identity("52:54:00:00:00:01"), PRIORITY)
        .unwrap()
        .id;
    Fixture {
        reconciler,
        inventory,
        device,
    }
}

fn identity(mac: &str) -> DeviceIdentity {
    DeviceIdentity::new(vec![Ethernet::new("eth0", MacAddress::new(mac), 0)])
        .with_model("Linux", DeviceType::Unknown)
}

fn facts(entries: &[(&str, &str, u64)]) -> DiskShareFacts {
    entries
        .iter()
        .map(|(lv, wwn, size)| ((*lv).to_owned(), DiskShareFact::new(wwn, *size)))
        .collect()
}

/// (wwn, volume, size) of every mount on the device, sorted.
fn mount_view(f: &Fixture) -> Vec<(String, Option<String>, Option<u64>, bool)> {
    let mut view: Vec<_> = f
        .inventory
        .mounts_for_device(f.device)
        .into_iter()
        .map(|m| {
            let wwn = f.inventory.share(m.share).unwrap().wwn.to_string();
            (wwn, m.volume, m.size_mb, m.is_virtual)
        })
        .collect();
    view.sort();
    view
}

#[test]
fn reconcile_is_idempotent() {
    let f = fixture(&["X1"]);
    let reported = facts(&[("lv0", "X1", 100)]);

    let first = f
        .reconciler
        .reconcile_disk_shares(f.device, &reported, PRIORITY)
        .unwrap();
    let after_first = mount_view(&f);
    let second = f
        .reconciler
        .reconcile_disk_shares(f.device, &reported, PRIORITY)
        .unwrap();

    assert_eq!(first.created, 1);
    assert_eq!(second.created, 0);
    assert_eq!(second.deleted, 0);
    assert_eq!(mount_view(&f), after_first);
    assert_eq!(
        mount_view(&f),
        [("X1".to_owned(), Some("lv0".to_owned()), Some(100), false)]
    );
}

#[test]
fn unreported_mount_is_deleted_but_virtual_survives() {
    let f = fixture(&["X1", "X2", "V1"]);
    f.reconciler
        .reconcile_disk_shares(
            f.device,
            &facts(&[("lv0", "X1", 100), ("lv1", "X2", 200)]),
            PRIORITY,
        )
        .unwrap();

    // A virtual link maintained elsewhere.
    let virt_share = f.inventory.share_by_wwn(&Wwn::new("V1")).unwrap();
    let mut virt = DiskShareMount::new(virt_share.id, f.device);
    virt.is_virtual = true;
    f.inventory.save_mount(virt).unwrap();

    let summary = f
        .reconciler
        .reconcile_disk_shares(f.device, &facts(&[("lv1", "X2", 200)]), PRIORITY)
        .unwrap();
    assert_eq!(summary.deleted, 1);

    let wwns: Vec<String> = mount_view(&f).into_iter().map(|m| m.0).collect();
    assert_eq!(wwns, ["V1", "X2"]);

    // Even an empty fact set leaves the virtual link alone.
    f.reconciler
        .reconcile_disk_shares(f.device, &DiskShareFacts::new(), PRIORITY)
        .unwrap();
    let remaining = mount_view(&f);
    assert_eq!(remaining.len(), 1);
    assert!(remaining[0].3);
}

#[test]
fn volume_label_is_first_write_wins_and_size_always_refreshes() {
    let f = fixture(&["X1"]);
    f.reconciler
        .reconcile_disk_shares(f.device, &facts(&[("data0", "X1", 100)]), PRIORITY)
        .unwrap();
    f.reconciler
        .reconcile_disk_shares(f.device, &facts(&[("other", "X1", 150)]), PRIORITY)
        .unwrap();

    assert_eq!(
        mount_view(&f),
        [("X1".to_owned(), Some("data0".to_owned()), Some(150), false)]
    );
}

#[test]
fn empty_volume_label_is_filled_in() {
    let f = fixture(&["X1"]);
    let share = f.inventory.share_by_wwn(&Wwn::new("X1")).unwrap();
    let mut mount = DiskShareMount::new(share.id, f.device);
    mount.volume = Some(String::new());
    f.inventory.save_mount(mount).unwrap();

    f.reconciler
        .reconcile_disk_shares(f.device, &facts(&[("data0", "X1", 100)]), PRIORITY)
        .unwrap();
    assert_eq!(mount_view(&f)[0].1.as_deref(), Some("data0"));
}

#[test]
fn unknown_share_fails_and_leaves_mounts_unchanged() {
    let f = fixture(&["X1", "X2"]);
    f.reconciler
        .reconcile_disk_shares(
            f.device,
            &facts(&[("lv0", "X1", 100), ("lv1", "X2", 200)]),
            PRIORITY,
        )
        .unwrap();
    let before = mount_view(&f);

    // X2 vanished (would be pruned) and X9 was never registered.
    let err = f
        .reconciler
        .reconcile_disk_shares(
            f.device,
            &facts(&[("lv0", "X1", 999), ("lv9", "X9", 10)]),
            PRIORITY,
        )
        .unwrap_err();

    assert!(matches!(err, CoreError::UnknownResource { ref wwn } if wwn == "X9"));
    assert_eq!(mount_view(&f), before);
    assert!(f.inventory.share_by_wwn(&Wwn::new("X9")).is_none());
}

#[test]
fn wwn_matching_ignores_format() {
    let f = fixture(&["600508B4000156D700012000000B0000"]);
    f.reconciler
        .reconcile_disk_shares(
            f.device,
            &facts(&[("lv0", "3600508b4000156d700012000000b0000", 100)]),
            PRIORITY,
        )
        .unwrap();
    assert_eq!(mount_view(&f).len(), 1);
}

#[test]
fn lower_priority_does_not_override_model() {
    let f = fixture(&[]);
    f.reconciler
        .upsert_device(
            &identity("52:54:00:00:00:01").with_model("PowerEdge R640", DeviceType::Server),
            Priority(50),
        )
        .unwrap();
    let dev = f
        .reconciler
        .upsert_device(&identity("52:54:00:00:00:01"), PRIORITY)
        .unwrap();

    assert_eq!(dev.id, f.device);
    assert_eq!(dev.model_name.as_deref(), Some("PowerEdge R640"));
    assert_eq!(dev.device_type, DeviceType::Server);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_upserts_of_one_device_create_it_once() {
    let inventory: Arc<dyn Inventory> = Arc::new(MemoryInventory::new());
    let reconciler = Reconciler::new(Arc::clone(&inventory));

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..32u8 {
        let reconciler = reconciler.clone();
        tasks.spawn(async move {
            // Every run reports the shared MAC plus one of its own.
            let id = DeviceIdentity::new(vec![
                Ethernet::new("eth0", MacAddress::new("52:54:00:aa:bb:cc"), 0),
                Ethernet::new("eth1", MacAddress::new(format!("52:54:00:00:01:{i:02x}")), 0),
            ]);
            reconciler.upsert_device(&id, PRIORITY).unwrap().id
        });
    }

    let mut ids = Vec::new();
    while let Some(id) = tasks.join_next().await {
        ids.push(id.unwrap());
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);

    let devices = inventory.devices();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].ethernets.len(), 33);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_reconciles_create_one_mount() {
    let f = fixture(&["X1"]);
    let reported = Arc::new(facts(&[("lv0", "X1", 100)]));

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..16 {
        let reconciler = f.reconciler.clone();
        let reported = Arc::clone(&reported);
        let device = f.device;
        tasks.spawn(async move {
            reconciler
                .reconcile_disk_shares(device, &reported, PRIORITY)
                .unwrap()
        });
    }
    let mut created = 0;
    while let Some(summary) = tasks.join_next().await {
        created += summary.unwrap().created;
    }

    assert_eq!(created, 1);
    assert_eq!(mount_view(&f).len(), 1);
}
