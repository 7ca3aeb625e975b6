// ── Probe registry ──
//
// Registration happens once at startup through `RegistryBuilder`. `build`
// resolves every chain up front so a registry with a cycle or a dangling
// requirement never reaches the scheduler.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::debug;

use super::Registration;
use crate::error::RegistryError;

/// Collects probe registrations before they are frozen.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    registrations: Vec<Registration>,
    names: HashSet<String>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a probe. Names are unique across the whole registry.
    pub fn register(&mut self, registration: Registration) -> Result<&mut Self, RegistryError> {
        if !self.names.insert(registration.name().to_owned()) {
            return Err(RegistryError::DuplicateProbe {
                name: registration.name().to_owned(),
            });
        }
        self.registrations.push(registration);
        Ok(self)
    }

    /// Resolve one chain without freezing the registry.
    pub fn resolve_order(&self, chain: &str) -> Result<Vec<&Registration>, RegistryError> {
        let order = topological_order(&self.registrations, chain)?;
        Ok(order.into_iter().map(|i| &self.registrations[i]).collect())
    }

    /// Validate every chain and freeze the registry.
    pub fn build(self) -> Result<ProbeRegistry, RegistryError> {
        let chains: BTreeSet<&str> = self
            .registrations
            .iter()
            .flat_map(|r| r.chains().iter().map(String::as_str))
            .collect();

        let mut orders = BTreeMap::new();
        for chain in chains {
            let order = topological_order(&self.registrations, chain)?;
            debug!(
                chain,
                order = ?order.iter().map(|&i| self.registrations[i].name()).collect::<Vec<_>>(),
                "resolved chain"
            );
            orders.insert(chain.to_owned(), order);
        }

        Ok(ProbeRegistry {
            registrations: self.registrations,
            orders,
        })
    }
}

/// Immutable, validated set of probes. Shared behind `Arc` and read
/// without locking.
#[derive(Debug)]
pub struct ProbeRegistry {
    registrations: Vec<Registration>,
    /// chain -> indices into `registrations`, in run order
    orders: BTreeMap<String, Vec<usize>>,
}

impl ProbeRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Run order for `chain`: every probe after all of its requirements,
    /// ties broken by registration order.
    pub fn resolve_order(&self, chain: &str) -> Result<Vec<&Registration>, RegistryError> {
        let order = self
            .orders
            .get(chain)
            .ok_or_else(|| RegistryError::UnknownChain {
                chain: chain.to_owned(),
            })?;
        Ok(order.iter().map(|&i| &self.registrations[i]).collect())
    }

    pub fn chains(&self) -> impl Iterator<Item = &str> {
        self.orders.keys().map(String::as_str)
    }

    /// Registrations in `chain`, in registration order.
    pub fn probes(&self, chain: &str) -> impl Iterator<Item = &Registration> {
        self.registrations.iter().filter(move |r| r.in_chain(chain))
    }

    pub fn get(&self, name: &str) -> Option<&Registration> {
        self.registrations.iter().find(|r| r.name() == name)
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

// ── Kahn's algorithm ─────────────────────────────────────────────────

fn topological_order(
    registrations: &[Registration],
    chain: &str,
) -> Result<Vec<usize>, RegistryError> {
    let members: Vec<usize> = registrations
        .iter()
        .enumerate()
        .filter(|(_, r)| r.in_chain(chain))
        .map(|(i, _)| i)
        .collect();
    if members.is_empty() {
        return Err(RegistryError::UnknownChain {
            chain: chain.to_owned(),
        });
    }

    let index_of: BTreeMap<&str, usize> = members
        .iter()
        .map(|&i| (registrations[i].name(), i))
        .collect();

    // dependency -> dependents, and remaining requirement count per probe
    let mut dependents: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    let mut pending: BTreeMap<usize, usize> = BTreeMap::new();
    for &i in &members {
        let reg = &registrations[i];
        for dep in reg.required() {
            let &d = index_of
                .get(dep.as_str())
                .ok_or_else(|| RegistryError::UnknownDependency {
                    chain: chain.to_owned(),
                    probe: reg.name().to_owned(),
                    dependency: dep.clone(),
                })?;
            dependents.entry(d).or_default().push(i);
        }
        pending.insert(i, reg.required().len());
    }

    // Lowest index first keeps ties in registration order.
    let mut ready: BTreeSet<usize> = pending
        .iter()
        .filter(|&(_, &n)| n == 0)
        .map(|(&i, _)| i)
        .collect();
    let mut order = Vec::with_capacity(members.len());

    while let Some(i) = ready.pop_first() {
        order.push(i);
        pending.remove(&i);
        for &dependent in dependents.get(&i).into_iter().flatten() {
            if let Some(n) = pending.get_mut(&dependent) {
                *n -= 1;
                if *n == 0 {
                    ready.insert(dependent);
                }
            }
        }
    }

    if !pending.is_empty() {
        return Err(RegistryError::Cycle {
            chain: chain.to_owned(),
            probes: cycle_members(registrations, &pending, &dependents),
        });
    }
    Ok(order)
}

/// Narrow the unresolved probes down to those on a cycle by repeatedly
/// dropping ones nothing unresolved depends on.
fn cycle_members(
    registrations: &[Registration],
    pending: &BTreeMap<usize, usize>,
    dependents: &BTreeMap<usize, Vec<usize>>,
) -> Vec<String> {
    let mut left: BTreeSet<usize> = pending.keys().copied().collect();
    loop {
        let leaves: Vec<usize> = left
            .iter()
            .copied()
            .filter(|i| {
                !dependents
                    .get(i)
                    .into_iter()
                    .flatten()
                    .any(|d| left.contains(d))
            })
            .collect();
        if leaves.is_empty() {
            break;
        }
        for leaf in leaves {
            left.remove(&leaf);
        }
    }
    left.into_iter()
        .map(|i| registrations[i].name().to_owned())
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ProbeError;
    use crate::probe::{Probe, ProbeOutcome, TargetContext};
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl Probe for Noop {
        async fn run(&self, _ctx: &mut TargetContext) -> Result<ProbeOutcome, ProbeError> {
            Ok(ProbeOutcome::success("ok"))
        }
    }

    fn reg(name: &str, requires: &[&str]) -> Registration {
        Registration::new(name, Noop)
            .chain("discovery")
            .requires(requires.iter().copied())
    }

    fn names(order: &[&Registration]) -> Vec<String> {
        order.iter().map(|r| r.name().to_owned()).collect()
    }

    #[test]
    fn dependencies_run_first_and_ties_keep_registration_order() {
        let mut b = RegistryBuilder::new();
        b.register(reg("ssh_linux", &["ping"])).unwrap();
        b.register(reg("port_scan", &["ping"])).unwrap();
        b.register(reg("ping", &[])).unwrap();
        let registry = b.build().unwrap();

        let order = registry.resolve_order("discovery").unwrap();
        assert_eq!(names(&order), ["ping", "ssh_linux", "port_scan"]);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut b = RegistryBuilder::new();
        b.register(reg("ping", &[])).unwrap();
        let err = b.register(reg("ping", &[])).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateProbe { name } if name == "ping"));
    }

    #[test]
    fn cycle_names_only_the_probes_on_it() {
        let mut b = RegistryBuilder::new();
        b.register(reg("ping", &[])).unwrap();
        b.register(reg("a", &["ping", "b"])).unwrap();
        b.register(reg("b", &["a"])).unwrap();
        b.register(reg("c", &["b"])).unwrap();

        let err = b.build().unwrap_err();
        match err {
            RegistryError::Cycle { chain, probes } => {
                assert_eq!(chain, "discovery");
                assert_eq!(probes, ["a", "b"]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn self_requirement_is_a_cycle() {
        let mut b = RegistryBuilder::new();
        b.register(reg("loop", &["loop"])).unwrap();
        assert!(matches!(
            b.resolve_order("discovery"),
            Err(RegistryError::Cycle { .. })
        ));
    }

    #[test]
    fn requirement_outside_the_chain_is_unknown() {
        let mut b = RegistryBuilder::new();
        b.register(Registration::new("snmp", Noop).chain("network"))
            .unwrap();
        b.register(reg("ssh_linux", &["snmp"])).unwrap();

        let err = b.build().unwrap_err();
        assert!(matches!(
            err,
            RegistryError::UnknownDependency { ref probe, ref dependency, .. }
                if probe == "ssh_linux" && dependency == "snmp"
        ));
    }

    #[test]
    fn unknown_chain_is_reported() {
        let mut b = RegistryBuilder::new();
        b.register(reg("ping", &[])).unwrap();
        let registry = b.build().unwrap();
        assert!(matches!(
            registry.resolve_order("postprocess"),
            Err(RegistryError::UnknownChain { .. })
        ));
        assert_eq!(registry.chains().collect::<Vec<_>>(), ["discovery"]);
    }

    #[test]
    fn probe_may_join_several_chains() {
        let mut b = RegistryBuilder::new();
        b.register(reg("ping", &[]).chain("quick")).unwrap();
        b.register(reg("ssh_linux", &["ping"])).unwrap();
        let registry = b.build().unwrap();

        assert_eq!(names(&registry.resolve_order("quick").unwrap()), ["ping"]);
        assert_eq!(registry.probes("discovery").count(), 2);
    }
}
