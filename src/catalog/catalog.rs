use super::template::{Domain, DomainCosts, GateCosts, GateFunction, GateTemplate};
use crate::{error::SynthError, truth_table::TruthTable};
use anyhow::{Context, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

/// A template able to realize a requested function, with the pin wiring that does it:
/// pin `p` of the gate reads requested input `binding[p]`.
#[derive(Debug, Clone)]
pub struct GateMatch {
    pub template: Arc<GateTemplate>,
    pub binding: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum FunctionKey {
    Plain(TruthTable),
    Pair(TruthTable, TruthTable),
}

/// Read-only set of gate templates, partitioned into plain and polymorphic gates and
/// indexed by function up to input permutation.
#[derive(Debug, Default)]
pub struct GateCatalog {
    templates: BTreeMap<String, Arc<GateTemplate>>,
    plain_index: HashMap<TruthTable, Vec<Arc<GateTemplate>>>,
    pair_index: HashMap<(TruthTable, TruthTable), Vec<Arc<GateTemplate>>>,
    cache: DashMap<FunctionKey, Arc<Vec<GateMatch>>>,
}

impl GateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_templates(
        templates: impl IntoIterator<Item = GateTemplate>,
    ) -> Result<Self, SynthError> {
        let mut catalog = Self::new();
        for t in templates {
            catalog.insert(t)?;
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, template: GateTemplate) -> Result<(), SynthError> {
        if self.templates.contains_key(&template.name) {
            return Err(SynthError::Catalog(format!(
                "duplicate gate `{}`",
                template.name
            )));
        }
        let template = Arc::new(template);
        match &template.function {
            GateFunction::Plain(t) => {
                let list = self.plain_index.entry(t.canonical()).or_default();
                list.push(template.clone());
                list.sort_by(|a, b| a.name.cmp(&b.name));
            }
            GateFunction::Polymorphic { hvdd, lvdd, .. } => {
                if hvdd.arity() != lvdd.arity() {
                    return Err(SynthError::Catalog(format!(
                        "gate `{}` has HVDD arity {} but LVDD arity {}",
                        template.name,
                        hvdd.arity(),
                        lvdd.arity()
                    )));
                }
                let list = self
                    .pair_index
                    .entry(TruthTable::canonical_pair(hvdd, lvdd))
                    .or_default();
                list.push(template.clone());
                list.sort_by(|a, b| a.name.cmp(&b.name));
            }
        }
        self.templates.insert(template.name.clone(), template);
        self.cache.clear();
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<GateTemplate>> {
        self.templates.get(name)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// All templates in name order.
    pub fn templates(&self) -> impl Iterator<Item = &Arc<GateTemplate>> {
        self.templates.values()
    }

    pub fn plain(&self) -> impl Iterator<Item = &Arc<GateTemplate>> {
        self.templates().filter(|t| !t.is_polymorphic())
    }

    pub fn polymorphic(&self) -> impl Iterator<Item = &Arc<GateTemplate>> {
        self.templates().filter(|t| t.is_polymorphic())
    }

    /// Largest arity among plain templates.
    pub fn max_arity(&self) -> usize {
        self.plain().map(|t| t.arity()).max().unwrap_or(0)
    }

    /// Largest arity among polymorphic templates.
    pub fn max_polymorphic_arity(&self) -> usize {
        self.polymorphic().map(|t| t.arity()).max().unwrap_or(0)
    }

    /// Plain templates equivalent to `target` up to input order, in name order.
    pub fn matching_plain(&self, target: &TruthTable) -> Arc<Vec<GateMatch>> {
        let key = FunctionKey::Plain(*target);
        if let Some(hit) = self.cache.get(&key) {
            return hit.clone();
        }
        let ans: Vec<GateMatch> = self
            .plain_index
            .get(&target.canonical())
            .into_iter()
            .flatten()
            .filter_map(|t| {
                let binding = t.table(Domain::Hvdd).find_binding(target)?;
                Some(GateMatch {
                    template: t.clone(),
                    binding,
                })
            })
            .collect();
        let ans = Arc::new(ans);
        self.cache.insert(key, ans.clone());
        ans
    }

    /// Polymorphic templates whose HVDD/LVDD pair equals `(hvdd, lvdd)` under one shared
    /// input permutation, in name order.
    pub fn matching_polymorphic(
        &self,
        hvdd: &TruthTable,
        lvdd: &TruthTable,
    ) -> Arc<Vec<GateMatch>> {
        let key = FunctionKey::Pair(*hvdd, *lvdd);
        if let Some(hit) = self.cache.get(&key) {
            return hit.clone();
        }
        let ans: Vec<GateMatch> = if hvdd.arity() == lvdd.arity() {
            self.pair_index
                .get(&TruthTable::canonical_pair(hvdd, lvdd))
                .into_iter()
                .flatten()
                .filter_map(|t| {
                    let GateFunction::Polymorphic { hvdd: h, lvdd: l, .. } = &t.function else {
                        return None;
                    };
                    let binding = TruthTable::find_pair_binding((h, l), (hvdd, lvdd))?;
                    Some(GateMatch {
                        template: t.clone(),
                        binding,
                    })
                })
                .collect()
        } else {
            Vec::new()
        };
        let ans = Arc::new(ans);
        self.cache.insert(key, ans.clone());
        ans
    }

    pub fn from_spec(spec: CatalogSpec) -> Result<Self, SynthError> {
        let mut catalog = Self::new();
        for gate in spec.plain {
            let table = table_from_rows(&gate.name, &gate.truth_table)?;
            catalog.insert(
                GateTemplate::plain(gate.name, table)
                    .with_costs(DomainCosts::uniform(gate.costs)),
            )?;
        }
        for gate in spec.polymorphic {
            let hvdd = table_from_rows(&gate.name, &gate.hvdd)?;
            let lvdd = table_from_rows(&gate.name, &gate.lvdd)?;
            catalog.insert(
                GateTemplate::polymorphic(gate.name, hvdd, lvdd, gate.has_reset).with_costs(
                    DomainCosts {
                        hvdd: gate.hvdd_costs,
                        lvdd: gate.lvdd_costs,
                    },
                ),
            )?;
        }
        Ok(catalog)
    }

    /// Load a catalog from its JSON boundary contract.
    pub fn from_json(text: &str) -> Result<Self> {
        let spec: CatalogSpec =
            serde_json::from_str(text).context("failed to parse gate catalog json")?;
        let catalog = Self::from_spec(spec).context("failed to build gate catalog")?;
        debug!(
            "loaded {} plain and {} polymorphic gates",
            catalog.plain().count(),
            catalog.polymorphic().count()
        );
        Ok(catalog)
    }
}

fn table_from_rows(name: &str, rows: &[bool]) -> Result<TruthTable, SynthError> {
    TruthTable::from_rows(rows).ok_or_else(|| {
        SynthError::Catalog(format!(
            "gate `{name}` has {} truth table rows, expected 2^arity with arity 1..=4",
            rows.len()
        ))
    })
}

/// JSON shape of an already-resolved gate catalog.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CatalogSpec {
    #[serde(default)]
    pub plain: Vec<PlainGateSpec>,
    #[serde(default)]
    pub polymorphic: Vec<PolymorphicGateSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlainGateSpec {
    pub name: String,
    /// Row `i` gives the output when input `j` equals bit `j` of `i`.
    pub truth_table: Vec<bool>,
    #[serde(flatten)]
    pub costs: GateCosts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolymorphicGateSpec {
    pub name: String,
    pub hvdd: Vec<bool>,
    pub lvdd: Vec<bool>,
    #[serde(default)]
    pub has_reset: bool,
    #[serde(default)]
    pub hvdd_costs: GateCosts,
    #[serde(default)]
    pub lvdd_costs: GateCosts,
}
