// ── Linux fact extraction ──
//
// Runs stock userland tools over the shell and parses their text output:
//   ip addr show        network identity
//   multipath -l        multipath device -> WWN
//   pvs / lvs           LVM: physical volume -> volume group -> logical volume
//   dmidecode           SMBIOS tables

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use rackprobe_net::{Error, RemoteShell};
use tracing::debug;

use super::{DiskShareFact, DiskShareFacts, FactExtractor};
use crate::codec::uncompress_base64_data;
use crate::model::{Ethernet, FirmwareTable, MacAddress, Wwn};

const IP_ADDR: &str = "/usr/sbin/ip addr show";
const MULTIPATH: &str = "multipath -l";
const PVS: &str = "pvs --noheadings --units M --separator '|'";
const LVS: &str = "lvs --noheadings --units M --separator '|'";
const DMIDECODE: &str = "/usr/sbin/dmidecode";

/// Extracts facts from a Linux host with LVM on multipath storage.
#[derive(Debug, Clone, Default)]
pub struct LinuxFactExtractor;

impl LinuxFactExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FactExtractor for LinuxFactExtractor {
    async fn extract_facts(&self, shell: &dyn RemoteShell) -> Result<DiskShareFacts, Error> {
        let multipath = optional_output(shell, MULTIPATH).await?;
        let devices = parse_multipath(&multipath);
        if devices.is_empty() {
            return Ok(DiskShareFacts::new());
        }
        // With multipath maps present, an LVM listing that fails is not
        // "no volumes": the caller would prune every mount.
        let pvs = shell.exec(PVS).await?.into_success(PVS)?;
        let lvs = shell.exec(LVS).await?.into_success(LVS)?;
        let groups = volume_groups_on(&parse_pvs(&pvs.stdout), &devices);
        Ok(disk_share_facts(&parse_lvs(&lvs.stdout), &groups))
    }

    async fn extract_identity(&self, shell: &dyn RemoteShell) -> Result<Vec<Ethernet>, Error> {
        let output = shell.exec(IP_ADDR).await?.into_success(IP_ADDR)?;
        Ok(parse_ip_addr(&output.stdout))
    }

    async fn extract_firmware(&self, shell: &dyn RemoteShell) -> Result<FirmwareTable, Error> {
        let raw = optional_output(shell, DMIDECODE).await?;
        let decoded = uncompress_base64_data(raw.as_bytes());
        Ok(parse_dmidecode(&String::from_utf8_lossy(&decoded)))
    }
}

/// Stdout of a tool the host may lack. A non-zero exit reads as "nothing
/// to report"; transport failures still propagate.
async fn optional_output(shell: &dyn RemoteShell, command: &str) -> Result<String, Error> {
    let output = shell.exec(command).await?;
    if output.success() {
        Ok(output.stdout)
    } else {
        debug!(
            address = %shell.address(),
            command,
            status = ?output.status,
            "command unavailable, no facts"
        );
        Ok(String::new())
    }
}

// ── Network identity ────────────────────────────────────────────────

/// Interfaces with a hardware address, deduplicated by MAC. VLAN and
/// other stacked interfaces (`eth0.100@eth0`) are reported under their
/// own label only when their MAC is new.
pub fn parse_ip_addr(output: &str) -> Vec<Ethernet> {
    let mut ethernets: Vec<Ethernet> = Vec::new();
    let mut label = String::new();

    for line in output.lines() {
        if !line.starts_with(char::is_whitespace) {
            // "2: eth0: <BROADCAST,...> mtu 1500 ..."
            let mut parts = line.splitn(3, ':');
            if let (Some(index), Some(name)) = (parts.next(), parts.next()) {
                if index.trim().parse::<u32>().is_ok() {
                    let name = name.trim();
                    label = name.split_once('@').map_or(name, |(n, _)| n).to_owned();
                }
            }
            continue;
        }

        let mut fields = line.split_whitespace();
        if fields.next() != Some("link/ether") {
            continue;
        }
        let Some(mac) = fields.next().map(MacAddress::new) else {
            continue;
        };
        if mac.is_identifying() && !ethernets.iter().any(|e| e.mac == mac) {
            ethernets.push(Ethernet::new(label.clone(), mac, 0));
        }
    }
    ethernets
}

// ── Storage ─────────────────────────────────────────────────────────

/// Multipath device paths -> WWN. Each map is reachable both as
/// `/dev/mapper/<name>` and `/dev/<dm-N>`.
pub fn parse_multipath(output: &str) -> HashMap<String, Wwn> {
    let mut devices = HashMap::new();

    for line in output.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        // "mpatha (3600508b4...) dm-0 HP,HSV210" or "3600508b4... dm-0 HP,HSV210"
        let (name, wwid, dm) = match fields.as_slice() {
            [name, wwid, dm, ..] if wwid.starts_with('(') && dm.starts_with("dm-") => {
                (*name, wwid.trim_matches(['(', ')']), *dm)
            }
            [wwid, dm, ..] if dm.starts_with("dm-") => (*wwid, *wwid, *dm),
            _ => continue,
        };
        if wwid.is_empty() || !wwid.chars().all(|c| c.is_ascii_hexdigit()) {
            continue;
        }
        let wwn = Wwn::new(wwid);
        devices.insert(format!("/dev/mapper/{name}"), wwn.clone());
        devices.insert(format!("/dev/{dm}"), wwn);
    }
    devices
}

/// `pvs` rows as (physical volume, volume group).
pub fn parse_pvs(output: &str) -> Vec<(String, String)> {
    output
        .lines()
        .filter_map(|line| {
            let mut cols = line.split('|');
            let pv = cols.next()?.trim();
            let vg = cols.next()?.trim();
            (!pv.is_empty() && !vg.is_empty()).then(|| (pv.to_owned(), vg.to_owned()))
        })
        .collect()
}

/// A logical volume row from `lvs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalVolume {
    pub name: String,
    pub group: String,
    pub size_mb: u64,
}

/// `lvs` rows. Sizes like `<100.50M` keep their integer part.
pub fn parse_lvs(output: &str) -> Vec<LogicalVolume> {
    output
        .lines()
        .filter_map(|line| {
            let cols: Vec<&str> = line.split('|').map(str::trim).collect();
            let [name, group, _attr, size, ..] = cols.as_slice() else {
                return None;
            };
            if name.is_empty() || group.is_empty() {
                return None;
            }
            Some(LogicalVolume {
                name: (*name).to_owned(),
                group: (*group).to_owned(),
                size_mb: parse_megabytes(size)?,
            })
        })
        .collect()
}

fn parse_megabytes(raw: &str) -> Option<u64> {
    let number = raw
        .trim()
        .trim_start_matches('<')
        .trim_end_matches(['M', 'm']);
    let whole = number.split(['.', ',']).next()?;
    whole.parse().ok()
}

/// Volume group -> WWN, for groups whose physical volume is a multipath
/// device. A group spanning several shares is attributed to the first.
fn volume_groups_on(
    pvs: &[(String, String)],
    devices: &HashMap<String, Wwn>,
) -> HashMap<String, Wwn> {
    let mut groups = HashMap::new();
    for (pv, vg) in pvs {
        if let Some(wwn) = devices.get(pv) {
            groups.entry(vg.clone()).or_insert_with(|| wwn.clone());
        }
    }
    groups
}

fn disk_share_facts(lvs: &[LogicalVolume], groups: &HashMap<String, Wwn>) -> DiskShareFacts {
    lvs.iter()
        .filter_map(|lv| {
            let wwn = groups.get(&lv.group)?;
            Some((
                lv.name.clone(),
                DiskShareFact {
                    wwn: wwn.clone(),
                    size_mb: lv.size_mb,
                },
            ))
        })
        .collect()
}

// ── SMBIOS ──────────────────────────────────────────────────────────

/// `dmidecode` output as section -> key -> value. Repeated sections get a
/// `#2`, `#3`, ... suffix; multi-line list values are dropped.
pub fn parse_dmidecode(output: &str) -> FirmwareTable {
    let mut table = FirmwareTable::new();
    let mut current: Option<String> = None;
    let mut expect_title = false;

    for line in output.lines() {
        if line.starts_with("Handle ") {
            expect_title = true;
            current = None;
            continue;
        }
        if expect_title {
            let title = line.trim();
            if title.is_empty() {
                continue;
            }
            expect_title = false;
            let name = unique_section_name(&table, title);
            table.insert(name.clone(), BTreeMap::new());
            current = Some(name);
            continue;
        }

        let Some(section) = current.as_ref() else {
            continue;
        };
        // Values sit one tab deep; deeper lines are list items.
        let Some(entry) = line.strip_prefix('\t') else {
            continue;
        };
        if entry.starts_with('\t') {
            continue;
        }
        if let Some((key, value)) = entry.split_once(':') {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            if let Some(fields) = table.get_mut(section) {
                fields.insert(key.trim().to_owned(), value.to_owned());
            }
        }
    }
    table
}

fn unique_section_name(table: &FirmwareTable, title: &str) -> String {
    if !table.contains_key(title) {
        return title.to_owned();
    }
    (2..)
        .map(|n| format!("{title} #{n}"))
        .find(|name| !table.contains_key(name))
        .unwrap_or_else(|| title.to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rackprobe_net::CommandOutput;
    use std::net::{IpAddr, Ipv4Addr};

    const IP_ADDR_OUTPUT: &str = "\
1: lo: <LOOPBACK,UP,LOWER_UP> mtu 65536 qdisc noqueue state UNKNOWN group default qlen 1000
    link/loopback 00:00:00:00:00:00 brd 00:00:00:00:00:00
    inet 127.0.0.1/8 scope host lo
2: eth0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc mq state UP group default qlen 1000
    link/ether 52:54:00:12:34:56 brd ff:ff:ff:ff:ff:ff
    inet 10.0.0.5/24 brd 10.0.0.255 scope global eth0
3: eth0.100@eth0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc noqueue state UP
    link/ether 52:54:00:12:34:56 brd ff:ff:ff:ff:ff:ff
4: eth1: <BROADCAST,MULTICAST> mtu 1500 qdisc noop state DOWN
    link/ether 52:54:00:AB:CD:EF brd ff:ff:ff:ff:ff:ff
5: bond0: <NO-CARRIER> mtu 1500
    link/ether 00:00:00:00:00:00 brd ff:ff:ff:ff:ff:ff
";

    const MULTIPATH_OUTPUT: &str = "\
mpatha (3600508b4000156d700012000000b0000) dm-0 HP,HSV210
size=100G features='1 queue_if_no_path' hwhandler='0' wp=rw
`-+- policy='round-robin 0' prio=0 status=active
  |- 0:0:0:1 sda 8:0  active undef running
  `- 1:0:0:1 sdb 8:16 active undef running
3600508b4000156d700012000000c0000 dm-1 HP,HSV210
size=50G features='0' hwhandler='0' wp=rw
";

    const PVS_OUTPUT: &str = "  /dev/mapper/mpatha|vg_data|lvm2|a--|102396.00M|0M
  /dev/dm-1|vg_logs|lvm2|a--|51196.00M|0M
  /dev/sda2|vg_root|lvm2|a--|<19.51M|0M
";

    const LVS_OUTPUT: &str = "  lv_data|vg_data|-wi-ao----|102396.00M||||
  lv_logs|vg_logs|-wi-ao----|<51196.50M||||
  root|vg_root|-wi-ao----|19.51M||||
";

    const DMIDECODE_OUTPUT: &str = "\
# dmidecode 3.3
Getting SMBIOS data from sysfs.
SMBIOS 2.8 present.

Handle 0x0000, DMI type 0, 24 bytes
BIOS Information
\tVendor: SeaBIOS
\tVersion: 1.14.0-2
\tCharacteristics:
\t\tBIOS characteristics not supported

Handle 0x0100, DMI type 1, 27 bytes
System Information
\tManufacturer: QEMU
\tProduct Name: Standard PC (Q35 + ICH9, 2009)
\tSerial Number: Not Specified

Handle 0x0400, DMI type 4, 42 bytes
Processor Information
\tSocket Designation: CPU 0

Handle 0x0401, DMI type 4, 42 bytes
Processor Information
\tSocket Designation: CPU 1
";

    struct FakeShell {
        outputs: HashMap<&'static str, &'static str>,
    }

    #[async_trait]
    impl RemoteShell for FakeShell {
        fn address(&self) -> IpAddr {
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))
        }

        async fn exec(&self, command: &str) -> Result<CommandOutput, Error> {
            Ok(match self.outputs.get(command) {
                Some(stdout) => CommandOutput {
                    stdout: (*stdout).to_owned(),
                    stderr: String::new(),
                    status: Some(0),
                },
                None => CommandOutput {
                    stdout: String::new(),
                    stderr: "command not found".into(),
                    status: Some(127),
                },
            })
        }
    }

    fn shell() -> FakeShell {
        FakeShell {
            outputs: HashMap::from([
                (IP_ADDR, IP_ADDR_OUTPUT),
                (MULTIPATH, MULTIPATH_OUTPUT),
                (PVS, PVS_OUTPUT),
                (LVS, LVS_OUTPUT),
                (DMIDECODE, DMIDECODE_OUTPUT),
            ]),
        }
    }

    #[test]
    fn ip_addr_dedupes_and_skips_null_macs() {
        let eths = parse_ip_addr(IP_ADDR_OUTPUT);
        let summary: Vec<(&str, &str)> = eths
            .iter()
            .map(|e| (e.label.as_str(), e.mac.as_str()))
            .collect();
        assert_eq!(
            summary,
            [("eth0", "52:54:00:12:34:56"), ("eth1", "52:54:00:ab:cd:ef")]
        );
    }

    #[test]
    fn multipath_accepts_named_and_bare_maps() {
        let devices = parse_multipath(MULTIPATH_OUTPUT);
        assert_eq!(
            devices["/dev/mapper/mpatha"].as_str(),
            "600508B4000156D700012000000B0000"
        );
        assert_eq!(devices["/dev/mapper/mpatha"], devices["/dev/dm-0"]);
        assert_eq!(
            devices["/dev/dm-1"].as_str(),
            "600508B4000156D700012000000C0000"
        );
        assert!(!devices.keys().any(|k| k.contains("size=")));
    }

    #[test]
    fn lvs_sizes_keep_integer_megabytes() {
        let lvs = parse_lvs(LVS_OUTPUT);
        assert_eq!(lvs[1].name, "lv_logs");
        assert_eq!(lvs[1].size_mb, 51196);
        assert_eq!(lvs[2].size_mb, 19);
    }

    #[test]
    fn dmidecode_sections_and_duplicates() {
        let table = parse_dmidecode(DMIDECODE_OUTPUT);
        assert_eq!(table["BIOS Information"]["Version"], "1.14.0-2");
        assert!(!table["BIOS Information"].contains_key("Characteristics"));
        assert_eq!(table["System Information"]["Manufacturer"], "QEMU");
        assert_eq!(table["Processor Information"]["Socket Designation"], "CPU 0");
        assert_eq!(
            table["Processor Information #2"]["Socket Designation"],
            "CPU 1"
        );
    }

    #[tokio::test]
    async fn extract_facts_maps_logical_volumes_to_shares() {
        let facts = LinuxFactExtractor::new()
            .extract_facts(&shell())
            .await
            .unwrap();

        let expected: DiskShareFacts = [
            (
                "lv_data".to_owned(),
                DiskShareFact::new("600508B4000156D700012000000B0000", 102_396),
            ),
            (
                "lv_logs".to_owned(),
                DiskShareFact::new("600508B4000156D700012000000C0000", 51_196),
            ),
        ]
        .into_iter()
        .collect();
        assert_eq!(facts, expected);
    }

    #[tokio::test]
    async fn host_without_multipath_reports_no_shares() {
        let mut shell = shell();
        shell.outputs.remove(MULTIPATH);
        let facts = LinuxFactExtractor::new()
            .extract_facts(&shell)
            .await
            .unwrap();
        assert!(facts.is_empty());
    }

    #[tokio::test]
    async fn failing_lvm_listing_is_a_transport_error() {
        for failing in [PVS, LVS] {
            let mut shell = shell();
            shell.outputs.remove(failing);
            let err = LinuxFactExtractor::new()
                .extract_facts(&shell)
                .await
                .unwrap_err();
            assert!(
                matches!(err, Error::CommandFailed { ref command, .. } if command == failing),
                "{failing}: {err}"
            );
        }
    }

    #[tokio::test]
    async fn firmware_accepts_encoded_output() {
        use base64::{Engine as _, engine::general_purpose};
        let encoded: &'static str = Box::leak(
            general_purpose::STANDARD
                .encode(DMIDECODE_OUTPUT)
                .into_boxed_str(),
        );
        let mut shell = shell();
        shell.outputs.insert(DMIDECODE, encoded);

        let table = LinuxFactExtractor::new()
            .extract_firmware(&shell)
            .await
            .unwrap();
        assert_eq!(table["System Information"]["Manufacturer"], "QEMU");
    }

    #[tokio::test]
    async fn missing_ip_tool_is_a_transport_error() {
        let mut shell = shell();
        shell.outputs.remove(IP_ADDR);
        let err = LinuxFactExtractor::new()
            .extract_identity(&shell)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CommandFailed { status: 127, .. }));
    }
}
