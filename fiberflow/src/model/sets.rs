use crate::model::error::ModelError;
use crate::model::linear::sanitize;
use crate::{ParameterStore, Product, Table};
use std::collections::{HashMap, HashSet};

/// Index sets of one model instance. Positions in these vectors are the
/// indices used by [`VarKey`](crate::model::VarKey).
#[derive(Clone, Debug)]
pub struct IndexSets {
    pub recovered_fibers: Vec<String>,
    pub virgin_fibers: Vec<String>,
    pub recovered_pulps: Vec<String>,
    pub virgin_pulps: Vec<String>,
    /// Selected products, in selection order.
    pub products: Vec<String>,
    /// Recycled-content levels per selected product.
    pub levels: Vec<Vec<f64>>,
    pub sources: Vec<String>,
    /// Position of each selected product in `ParameterStore::products`.
    pub(crate) product_rows: Vec<usize>,
}

impl IndexSets {
    pub fn product_index(&self, name: &str) -> Option<usize> {
        self.products.iter().position(|p| p == name)
    }

    /// `(level, product)` pairs in declaration order.
    pub fn demand_arcs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.levels
            .iter()
            .enumerate()
            .flat_map(|(t, lv)| (0..lv.len()).map(move |r| (r, t)))
    }
}

fn config(msg: impl Into<String>) -> ModelError {
    ModelError::Configuration(msg.into())
}

/// Names must stay distinct once sanitized into LP identifiers, otherwise
/// two variables would share one column in the exported problem.
fn unique<'a>(what: &str, names: impl Iterator<Item = &'a str>, seen: &mut HashMap<String, &'a str>) -> Result<(), ModelError> {
    for n in names {
        let lp_name = sanitize(n);
        match seen.get(&lp_name) {
            Some(&prev) if prev == n => return Err(config(format!("duplicate {what} `{n}`"))),
            Some(&prev) => {
                return Err(config(format!(
                    "{what} names `{prev}` and `{n}` both become LP identifier `{lp_name}`"
                )))
            }
            None => {
                seen.insert(lp_name, n);
            }
        }
    }
    Ok(())
}

fn check_table(name: &str, table: &Table, rows: &HashSet<&str>, cols: &HashSet<&str>) -> Result<(), ModelError> {
    for (r, inner) in table {
        if !rows.contains(r.as_str()) {
            return Err(config(format!("{name}: unknown row `{r}`")));
        }
        for c in inner.keys() {
            if !cols.contains(c.as_str()) {
                return Err(config(format!("{name}: unknown column `{c}` in row `{r}`")));
            }
        }
    }
    Ok(())
}

fn check_product(
    p: &Product,
    pulps: &HashSet<&str>,
    recovered: &HashSet<&str>,
    sources: &HashSet<&str>,
) -> Result<(), ModelError> {
    let n = p.levels.len();
    if n == 0 {
        return Err(config(format!("product `{}` has no recycled-content levels", p.name)));
    }
    if p.levels.iter().any(|r| !(0.0..=1.0).contains(r)) {
        return Err(config(format!("product `{}`: levels must lie in [0, 1]", p.name)));
    }
    if p.levels.windows(2).any(|w| w[0] >= w[1]) {
        return Err(config(format!("product `{}`: levels must be strictly ascending", p.name)));
    }
    for (what, v) in [
        ("old_demand", &p.old_demand),
        ("min_demand", &p.min_demand),
        ("max_demand", &p.max_demand),
    ] {
        if v.len() != n {
            return Err(config(format!(
                "product `{}`: {what} has {} values for {n} levels",
                p.name,
                v.len()
            )));
        }
    }
    if p.old_demand_total() <= 0.0 {
        return Err(config(format!("product `{}`: baseline demand is zero", p.name)));
    }
    if !(0.0..1.0).contains(&p.non_fiber_fraction) {
        return Err(config(format!("product `{}`: non-fiber fraction must lie in [0, 1)", p.name)));
    }
    for (pulp, per_level) in &p.max_pulp_use {
        if !pulps.contains(pulp.as_str()) {
            return Err(config(format!("product `{}`: max_pulp_use names unknown pulp `{pulp}`", p.name)));
        }
        if per_level.len() != n {
            return Err(config(format!(
                "product `{}`: max_pulp_use[{pulp}] has {} values for {n} levels",
                p.name,
                per_level.len()
            )));
        }
    }
    if let Some(pulp) = p.min_pulp.keys().find(|k| !pulps.contains(k.as_str())) {
        return Err(config(format!("product `{}`: min_pulp names unknown pulp `{pulp}`", p.name)));
    }
    if let Some(s) = p
        .source_share
        .keys()
        .chain(p.collection.keys())
        .find(|k| !sources.contains(k.as_str()))
    {
        return Err(config(format!("product `{}`: unknown source `{s}`", p.name)));
    }
    let recovery_name = format!("product `{}` recovery_share", p.name);
    check_table(&recovery_name, &p.recovery_share, recovered, sources)
}

/// Check that every parameter table lines up with the declared sets and
/// resolve the product selection.
pub(crate) fn build_sets(params: &ParameterStore, products: &[String]) -> Result<IndexSets, ModelError> {
    let mut fibers = HashMap::new();
    unique("fiber", params.recovered_fibers.iter().map(|f| f.code.as_str()), &mut fibers)?;
    unique("fiber", params.virgin_fibers.iter().map(|f| f.code.as_str()), &mut fibers)?;
    let mut pulps = HashMap::new();
    unique("pulp", params.recovered_pulps.iter().map(|p| p.name.as_str()), &mut pulps)?;
    unique("pulp", params.virgin_pulps.iter().map(|p| p.name.as_str()), &mut pulps)?;
    unique("product", params.products.iter().map(|p| p.name.as_str()), &mut HashMap::new())?;
    unique("source", params.sources.iter().map(|s| s.name.as_str()), &mut HashMap::new())?;

    if params.recovered_fibers.is_empty() || params.recovered_pulps.is_empty() {
        return Err(config("at least one recovered fiber and one recovered pulp are required"));
    }
    if products.is_empty() {
        return Err(config("no products selected"));
    }

    let fiber_set: HashSet<&str> = params
        .recovered_fibers
        .iter()
        .map(|f| f.code.as_str())
        .chain(params.virgin_fibers.iter().map(|f| f.code.as_str()))
        .collect();
    let recovered_set: HashSet<&str> = params.recovered_fibers.iter().map(|f| f.code.as_str()).collect();
    let pulp_set: HashSet<&str> = params
        .recovered_pulps
        .iter()
        .chain(&params.virgin_pulps)
        .map(|p| p.name.as_str())
        .collect();
    let recovered_pulp_set: HashSet<&str> = params.recovered_pulps.iter().map(|p| p.name.as_str()).collect();
    let source_set: HashSet<&str> = params.sources.iter().map(|s| s.name.as_str()).collect();

    check_table("fiber_to_pulp_yield", &params.fiber_to_pulp_yield, &fiber_set, &pulp_set)?;
    check_table("recipe_yield", &params.recipe_yield, &fiber_set, &pulp_set)?;
    check_table("recipe_min", &params.recipe_min, &recovered_set, &recovered_pulp_set)?;
    check_table("recipe_max", &params.recipe_max, &recovered_set, &recovered_pulp_set)?;

    if let Some(s) = params
        .contamination
        .affected_sources
        .iter()
        .find(|s| !source_set.contains(s.as_str()))
    {
        tracing::warn!(source = %s, "contamination names a source the store does not declare");
    }

    let mut product_rows = Vec::with_capacity(products.len());
    let mut levels = Vec::with_capacity(products.len());
    let mut seen = HashSet::new();
    for name in products {
        if !seen.insert(name.as_str()) {
            return Err(config(format!("product `{name}` selected twice")));
        }
        let row = params
            .products
            .iter()
            .position(|p| &p.name == name)
            .ok_or_else(|| config(format!("selected product `{name}` is not in the parameter store")))?;
        let p = &params.products[row];
        check_product(p, &pulp_set, &recovered_set, &source_set)?;
        product_rows.push(row);
        levels.push(p.levels.clone());
    }

    Ok(IndexSets {
        recovered_fibers: params.recovered_fibers.iter().map(|f| f.code.clone()).collect(),
        virgin_fibers: params.virgin_fibers.iter().map(|f| f.code.clone()).collect(),
        recovered_pulps: params.recovered_pulps.iter().map(|p| p.name.clone()).collect(),
        virgin_pulps: params.virgin_pulps.iter().map(|p| p.name.clone()).collect(),
        products: products.to_vec(),
        levels,
        sources: params.sources.iter().map(|s| s.name.clone()).collect(),
        product_rows,
    })
}
