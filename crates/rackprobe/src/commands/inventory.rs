//! Inventory command handlers.

use bytesize::ByteSize;
use tabled::Tabled;
use tracing::info;

use rackprobe_core::{
    CoreError, Device, DeviceId, DiskShare, DiskShareMount, Inventory, MacAddress, Wwn,
};

use crate::cli::{GlobalOpts, InventoryArgs, InventoryCommand};
use crate::commands::OpenInventory;
use crate::error::CliError;
use crate::{config, output};

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Type")]
    dtype: String,
    #[tabled(rename = "Serial")]
    serial: String,
    #[tabled(rename = "MACs")]
    macs: String,
    #[tabled(rename = "Last Seen")]
    last_seen: String,
}

impl From<&Device> for DeviceRow {
    fn from(d: &Device) -> Self {
        Self {
            id: d.id.to_string(),
            model: d.model_name.clone().unwrap_or_default(),
            dtype: d.device_type.to_string(),
            serial: d.serial_number.clone().unwrap_or_default(),
            macs: d.macs().map(MacAddress::as_str).collect::<Vec<_>>().join(", "),
            last_seen: d
                .last_seen
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
        }
    }
}

#[derive(Tabled)]
struct ShareRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "WWN")]
    wwn: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Size")]
    size: String,
}

impl From<&DiskShare> for ShareRow {
    fn from(s: &DiskShare) -> Self {
        Self {
            id: s.id.to_string(),
            wwn: s.wwn.to_string(),
            label: s.label.clone().unwrap_or_default(),
            size: s.size_mb.map(format_mb).unwrap_or_default(),
        }
    }
}

#[derive(Tabled)]
struct MountRow {
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "Share WWN")]
    wwn: String,
    #[tabled(rename = "Volume")]
    volume: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Virtual")]
    is_virtual: bool,
}

fn format_mb(mb: u64) -> String {
    ByteSize::mib(mb).to_string()
}

fn device_detail(d: &Device) -> String {
    let mut lines = vec![
        format!("ID:           {}", d.id),
        format!("Name:         {}", d.name.as_deref().unwrap_or("-")),
        format!("Model:        {}", d.model_name.as_deref().unwrap_or("-")),
        format!("Type:         {}", d.device_type),
        format!("Serial:       {}", d.serial_number.as_deref().unwrap_or("-")),
        format!("Manufacturer: {}", d.manufacturer.as_deref().unwrap_or("-")),
        format!("BIOS:         {}", d.bios_version.as_deref().unwrap_or("-")),
        format!("Created:      {}", d.created_at.format("%Y-%m-%d %H:%M:%S")),
        format!(
            "Last seen:    {}",
            d.last_seen.map_or_else(
                || "-".into(),
                |t| t.format("%Y-%m-%d %H:%M:%S").to_string()
            )
        ),
    ];
    if !d.ethernets.is_empty() {
        lines.push("Interfaces:".into());
        for eth in &d.ethernets {
            let speed = if eth.speed == 0 {
                String::new()
            } else {
                format!(" ({} Mbit/s)", eth.speed)
            };
            lines.push(format!("  {:<12} {}{speed}", eth.label, eth.mac));
        }
    }
    if !d.firmware.is_empty() {
        lines.push(format!("Firmware:     {} section(s)", d.firmware.len()));
    }
    lines.join("\n")
}

// ── Lookups ─────────────────────────────────────────────────────────

/// Find a device by UUID, falling back to any of its MACs.
fn find_device(store: &dyn Inventory, id_or_mac: &str) -> Result<Device, CliError> {
    let found = match id_or_mac.parse::<DeviceId>() {
        Ok(id) => store.device(id),
        Err(_) => store.device_by_mac(&MacAddress::new(id_or_mac)),
    };
    found.ok_or_else(|| {
        CoreError::DeviceNotFound {
            identifier: id_or_mac.to_owned(),
        }
        .into()
    })
}

fn mount_row(store: &dyn Inventory, m: &DiskShareMount) -> MountRow {
    MountRow {
        device: m.device.to_string(),
        wwn: store
            .share(m.share)
            .map(|s| s.wwn.to_string())
            .unwrap_or_default(),
        volume: m.volume.clone().unwrap_or_default(),
        size: m.size_mb.map(format_mb).unwrap_or_default(),
        is_virtual: m.is_virtual,
    }
}

fn validate_wwn(raw: &str) -> Result<Wwn, CliError> {
    let wwn = Wwn::new(raw);
    if wwn.as_str().is_empty() || !wwn.as_str().chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(CliError::Validation {
            field: "wwn".into(),
            reason: format!("'{raw}' is not a hexadecimal World Wide Name"),
        });
    }
    Ok(wwn)
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: InventoryArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let inventory = OpenInventory::open(global, &cfg)?;
    let store: &dyn Inventory = inventory.store.as_ref();

    let out = match args.command {
        InventoryCommand::Devices => {
            let devices = store.devices();
            output::render_list(
                global.output,
                &devices,
                |d| DeviceRow::from(d),
                |d| d.id.to_string(),
            )?
        }

        InventoryCommand::Device { id_or_mac } => {
            let device = find_device(store, &id_or_mac)?;
            output::render_single(global.output, &device, device_detail, |d| d.id.to_string())?
        }

        InventoryCommand::Shares => {
            let mut shares = store.shares();
            shares.sort_by(|a, b| a.wwn.cmp(&b.wwn));
            output::render_list(
                global.output,
                &shares,
                |s| ShareRow::from(s),
                |s| s.wwn.to_string(),
            )?
        }

        InventoryCommand::Mounts { device } => {
            let mut mounts = match device {
                Some(id_or_mac) => store.mounts_for_device(find_device(store, &id_or_mac)?.id),
                None => store.mounts(),
            };
            mounts.sort_by_key(DiskShareMount::key);
            output::render_list(
                global.output,
                &mounts,
                |m| mount_row(store, m),
                |m| format!("{}\t{}", m.device, m.share),
            )?
        }

        InventoryCommand::AddShare { wwn, label, size } => {
            let mut share = DiskShare::new(validate_wwn(&wwn)?);
            if let Some(label) = label {
                share = share.with_label(label);
            }
            if let Some(size) = size {
                share = share.with_size_mb(size);
            }
            let requested = share.id;
            let stored = store.register_share(share);
            if stored.id == requested {
                inventory.save()?;
                info!(wwn = %stored.wwn, "disk share registered");
            } else if !global.quiet {
                eprintln!("Disk share {} is already registered", stored.wwn);
            }
            output::render_single(
                global.output,
                &stored,
                |s| output::render_table(&[ShareRow::from(s)]),
                |s| s.id.to_string(),
            )?
        }
    };

    output::print_output(&out, global.quiet);
    Ok(())
}
