use crate::model::GroupId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Handle of a declared decision variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(pub(crate) usize);

impl VarId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LinearExpr {
    pub(crate) terms: BTreeMap<VarId, f64>,
    pub(crate) constant: f64,
}

impl LinearExpr {
    pub fn zero() -> Self {
        Self {
            terms: BTreeMap::new(),
            constant: 0.0,
        }
    }
    pub fn from_const(v: f64) -> Self {
        let mut e = Self::zero();
        e.constant = v;
        e
    }
    pub fn from_var(v: VarId, c: f64) -> Self {
        let mut e = Self::zero();
        e.add_term(v, c);
        e
    }
    pub fn add_term(&mut self, v: VarId, c: f64) {
        if c == 0.0 {
            return;
        }
        let slot = self.terms.entry(v).or_insert(0.0);
        *slot += c;
        if slot.abs() <= 1e-12 {
            self.terms.remove(&v);
        }
    }
    /// `self - other`; terms that cancel are dropped.
    pub fn sub(mut self, other: LinearExpr) -> LinearExpr {
        self.constant -= other.constant;
        for (v, c) in other.terms {
            self.add_term(v, -c);
        }
        self
    }

    pub fn terms(&self) -> impl Iterator<Item = (VarId, f64)> + '_ {
        self.terms.iter().map(|(v, c)| (*v, *c))
    }
    pub fn coefficient(&self, v: VarId) -> f64 {
        self.terms.get(&v).copied().unwrap_or(0.0)
    }
    pub fn constant(&self) -> f64 {
        self.constant
    }
    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    /// Value of the expression for a full assignment indexed by `VarId`.
    pub fn eval(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(v, c)| c * values.get(v.0).copied().unwrap_or(0.0))
            .sum::<f64>()
            + self.constant
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sense {
    Le,
    Ge,
    Eq,
}

impl Sense {
    pub fn holds(&self, lhs: f64, rhs: f64, tol: f64) -> bool {
        match self {
            Sense::Le => lhs <= rhs + tol,
            Sense::Ge => lhs >= rhs - tol,
            Sense::Eq => (lhs - rhs).abs() <= tol,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjSense {
    Minimize,
    Maximize,
}

/// One row: `expr sense rhs`, with every constant folded into `rhs`.
#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    pub(crate) group: GroupId,
    pub(crate) name: String,
    pub(crate) expr: LinearExpr, // lhs
    pub(crate) sense: Sense,
    pub(crate) rhs: f64,
}

impl Constraint {
    /// `lhs sense rhs`, normalized so that variables sit on the left.
    pub(crate) fn new(group: GroupId, name: String, lhs: LinearExpr, sense: Sense, rhs: LinearExpr) -> Self {
        let mut expr = lhs.sub(rhs);
        let rhs = -expr.constant;
        expr.constant = 0.0;
        Self {
            group,
            name,
            expr,
            sense,
            rhs,
        }
    }

    pub fn group(&self) -> GroupId {
        self.group
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn expr(&self) -> &LinearExpr {
        &self.expr
    }
    pub fn sense(&self) -> Sense {
        self.sense
    }
    pub fn rhs(&self) -> f64 {
        self.rhs
    }

    pub fn is_satisfied(&self, values: &[f64], tol: f64) -> bool {
        self.sense.holds(self.expr.eval(values), self.rhs, tol)
    }
}

/// Flat, solver-ready view of a model: variables are `x >= 0`.
#[derive(Clone, Debug)]
pub struct LpProblem {
    pub(crate) var_names: Vec<String>,
    pub(crate) objective: LinearExpr,
    pub(crate) sense: ObjSense,
    pub(crate) constraints: Vec<Constraint>,
}

impl LpProblem {
    pub fn num_vars(&self) -> usize {
        self.var_names.len()
    }
    pub fn var_names(&self) -> &[String] {
        &self.var_names
    }
    pub fn objective(&self) -> &LinearExpr {
        &self.objective
    }
    pub fn sense(&self) -> ObjSense {
        self.sense
    }
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub(crate) fn push_var(&mut self, name: String) -> VarId {
        self.var_names.push(name);
        VarId(self.var_names.len() - 1)
    }
}

/// Render in CPLEX LP format (readable by SCIP, HiGHS and CBC).
pub fn emit_lp(lp: &LpProblem) -> String {
    let mut out = String::new();
    match lp.sense {
        ObjSense::Minimize => out.push_str("Minimize\n obj: "),
        ObjSense::Maximize => out.push_str("Maximize\n obj: "),
    }
    out.push_str(&fmt_lin(&lp.objective, &lp.var_names));
    out.push('\n');
    out.push_str("Subject To\n");
    for c in &lp.constraints {
        out.push_str(&format!(
            " {}: {} {} {}\n",
            sanitize(&c.name),
            fmt_lin(&c.expr, &lp.var_names),
            fmt_sense(c.sense),
            fmt_num(c.rhs)
        ));
    }
    // default bounds in LP format are already [0, +inf)
    out.push_str("End\n");
    out
}

fn fmt_sense(s: Sense) -> &'static str {
    match s {
        Sense::Le => "<=",
        Sense::Ge => ">=",
        Sense::Eq => "=",
    }
}

fn fmt_num(v: f64) -> String {
    if (v - v.round()).abs() < 1e-9 {
        format!("{}", v.round() as i64)
    } else {
        format!("{:.9}", v)
    }
}

fn fmt_lin(e: &LinearExpr, names: &[String]) -> String {
    let mut parts: Vec<String> = vec![];
    for (v, c) in e.terms.iter() {
        let n = &names[v.0];
        if (c - 1.0).abs() < 1e-12 {
            parts.push(format!("+1 {}", n));
        } else if (c + 1.0).abs() < 1e-12 {
            parts.push(format!("-1 {}", n));
        } else {
            parts.push(format!("{:+.9} {}", c, n));
        }
    }
    if parts.is_empty() {
        parts.push("+0".to_string());
    }
    // rows are normalized, so only the objective can carry an offset
    if e.constant.abs() > 1e-12 {
        parts.push(format!("{:+.9}", e.constant));
    }
    parts.join(" ")
}

/// LP identifiers: ASCII alphanumerics and `_` only.
pub(crate) fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
