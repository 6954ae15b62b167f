//! layout — flat parameter vector layout for a normalized specification.
//!
//! Purpose
//! -------
//! Assign every free scalar parameter of a [`ModelSpec`] a stable position
//! in one flat vector and record, for every parameter *occurrence*, where
//! its value comes from: a free slot, a fixed (normalized) value, or the
//! complement `1 − Σ` of other free slots (derived mixture weight).
//!
//! Key behaviors
//! -------------
//! - Blocks are laid out in the fixed order of [`Block`]: loadings →
//!   intercepts (constant, then control coefficients) → measurement
//!   variances → transition coefficients → shock variances → mixture
//!   parameters → anchoring parameters.
//! - Within the measurement blocks factors are walked in declaration order,
//!   then periods, then the factor's measurements. Within the transition and
//!   shock blocks, stages then factors.
//! - Normalized quantities consume no slot; they appear in the forward map
//!   as [`Slot::Fixed`].
//! - Under `time_invariant_measurement_system`, occurrences sharing a
//!   [`MeasurementIdentity`] are merged through a union-find; the first
//!   occurrence in layout order allocates the slot and later ones alias it.
//!   If any member of a merged class is normalized, the whole class is
//!   fixed; two different normalized values raise
//!   [`LayoutError::ConflictingNormalization`].
//!
//! Invariants & assumptions
//! ------------------------
//! - Building is deterministic: the same specification always yields the same
//!   length, order, names, bounds and start values.
//! - Every free index `0..n_free` is owned by at least one identity; the
//!   first identity of each index is its representative name.
//! - The layout is immutable after construction and may be shared across
//!   all likelihood evaluations of an estimation run.
//!
//! Conventions
//! -----------
//! - Variances and Cholesky diagonals are bounded below by `0`, or by
//!   `bounds_distance` when `robust_bounds` is set. Free mixture weights and
//!   log-CES gammas lie in `[0, 1]`. Everything else is unbounded.
//! - Initial mixture means are free. With several components the first
//!   factor's means are ordered: component `k ≥ 1` is the mean of component
//!   `k − 1` plus a non-negative difference (`mixture_mean_diff__k__…`), so
//!   that components cannot be relabelled.
//!
//! Downstream usage
//! ----------------
//! - [`ModelParams`](crate::model::core::params::ModelParams) reads the
//!   numeric slot tables (`measurement`, `transition`, `shock_variance`,
//!   `mixture`, `anchoring`) to turn a vector into structured parameters.
//! - Reporting uses [`ParamLayout::names`] and [`ParamLayout::entries`].
//!
//! Testing notes
//! -------------
//! - Unit tests cover slot counts, determinism, the index ↔ identity
//!   bijection, aliasing and conflicts, and fixed slots for constant factors.
use crate::model::{
    core::{
        equivalence::UnionFind,
        spec::{MeasurementIdentity, ModelSpec},
    },
    errors::{LayoutError, LayoutResult},
};
use ndarray::{Array1, ArrayView1};
use std::{
    collections::{hash_map::Entry, HashMap, HashSet},
    fmt,
    ops::Range,
};

/// Parameter blocks in layout order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Block {
    Loadings,
    Intercepts,
    MeasVariances,
    Transition,
    ShockVariances,
    Mixture,
    Anchoring,
}

/// Semantic identity of one parameter occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParamId {
    Loading { period: usize, measurement: String, factor: String },
    Intercept { period: usize, measurement: String },
    ControlCoeff { period: usize, measurement: String, control: String },
    MeasVariance { period: usize, measurement: String },
    Transition { stage: usize, factor: String, name: String },
    ShockVariance { stage: usize, factor: String },
    MixtureWeight { component: usize },
    MixtureMean { component: usize, factor: String },
    MixtureMeanDiff { component: usize, factor: String },
    MixtureCholesky { component: usize, row: usize, col: usize },
    AnchoringLoading { factor: String },
    AnchoringIntercept,
    AnchoringControl { control: String },
    AnchoringVariance,
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamId::Loading { period, measurement, factor } => {
                write!(f, "loadings__{period}__{measurement}__{factor}")
            }
            ParamId::Intercept { period, measurement } => {
                write!(f, "intercepts__{period}__{measurement}__constant")
            }
            ParamId::ControlCoeff { period, measurement, control } => {
                write!(f, "intercepts__{period}__{measurement}__{control}")
            }
            ParamId::MeasVariance { period, measurement } => {
                write!(f, "meas_var__{period}__{measurement}")
            }
            ParamId::Transition { name, .. } => f.write_str(name),
            ParamId::ShockVariance { stage, factor } => write!(f, "shock_var__{stage}__{factor}"),
            ParamId::MixtureWeight { component } => write!(f, "mixture_weight__{component}"),
            ParamId::MixtureMean { component, factor } => {
                write!(f, "mixture_mean__{component}__{factor}")
            }
            ParamId::MixtureMeanDiff { component, factor } => {
                write!(f, "mixture_mean_diff__{component}__{factor}")
            }
            ParamId::MixtureCholesky { component, row, col } => {
                write!(f, "mixture_chol__{component}__{row}__{col}")
            }
            ParamId::AnchoringLoading { factor } => write!(f, "anchoring_loading__{factor}"),
            ParamId::AnchoringIntercept => f.write_str("anchoring_intercept"),
            ParamId::AnchoringControl { control } => write!(f, "anchoring_control__{control}"),
            ParamId::AnchoringVariance => f.write_str("anchoring_var"),
        }
    }
}

/// Where the value of a parameter occurrence comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    /// Position in the free parameter vector.
    Free(usize),
    /// Normalized or structurally fixed value.
    Fixed(f64),
    /// `1 − Σ params[i]` over the listed free positions.
    Complement(Vec<usize>),
    /// `Σ params[i]` over the listed free positions (ordered mixture means).
    Sum(Vec<usize>),
}

impl Slot {
    /// Read the value from a full parameter vector.
    pub fn value(&self, params: ArrayView1<f64>) -> f64 {
        match self {
            Slot::Free(i) => params[*i],
            Slot::Fixed(v) => *v,
            Slot::Complement(idx) => 1.0 - idx.iter().map(|&i| params[i]).sum::<f64>(),
            Slot::Sum(idx) => idx.iter().map(|&i| params[i]).sum(),
        }
    }

    pub fn free_index(&self) -> Option<usize> {
        match self {
            Slot::Free(i) => Some(*i),
            _ => None,
        }
    }
}

/// Forward-map entry.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutEntry {
    pub id: ParamId,
    pub block: Block,
    pub slot: Slot,
}

/// Slots of one measurement equation (aligned with its `factors` / `controls`).
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementSlots {
    pub loadings: Vec<Slot>,
    pub intercept: Slot,
    pub controls: Vec<Slot>,
    pub variance: Slot,
}

/// Slots of the initial mixture distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct MixtureSlots {
    pub weights: Vec<Slot>,
    /// `means[k][f]`.
    pub means: Vec<Vec<Slot>>,
    /// `cholesky[k]` lists `(row, col, slot)` of the lower triangle.
    pub cholesky: Vec<Vec<(usize, usize, Slot)>>,
}

/// Slots of the anchoring equation.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchoringSlots {
    /// Aligned with `AnchoringSpec::factors`.
    pub loadings: Vec<Slot>,
    pub intercept: Slot,
    /// Aligned with `ModelSpec::anchoring_controls`.
    pub controls: Vec<Slot>,
    pub variance: Slot,
}

/// Immutable parameter layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamLayout {
    entries: Vec<LayoutEntry>,
    positions: HashMap<ParamId, usize>,
    free_ids: Vec<Vec<ParamId>>,
    lower: Array1<f64>,
    upper: Array1<f64>,
    start: Array1<f64>,
    blocks: Vec<(Block, Range<usize>)>,
    /// `measurement[t][j]` for the j-th measurement equation of period t.
    pub measurement: Vec<Vec<MeasurementSlots>>,
    /// `transition[stage][factor]`: free coefficients (empty if unused).
    pub transition: Vec<Vec<Vec<Slot>>>,
    /// `shock_variance[stage][factor]`.
    pub shock_variance: Vec<Vec<Slot>>,
    pub mixture: MixtureSlots,
    pub anchoring: Option<AnchoringSlots>,
}

/// Kind of measurement-block occurrence, used as aliasing key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum OccurrenceKind {
    Loading(usize),
    Intercept,
    Control(String),
    Variance,
}

#[derive(Debug)]
struct Occurrence {
    id: ParamId,
    fixed: Option<f64>,
}

/// Incremental builder; only used inside [`ParamLayout::build`].
struct Builder {
    entries: Vec<LayoutEntry>,
    free_ids: Vec<Vec<ParamId>>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    start: Vec<f64>,
    blocks: Vec<(Block, Range<usize>)>,
}

impl Builder {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            free_ids: Vec::new(),
            lower: Vec::new(),
            upper: Vec::new(),
            start: Vec::new(),
            blocks: Vec::new(),
        }
    }

    fn n_free(&self) -> usize {
        self.free_ids.len()
    }

    fn free(&mut self, id: ParamId, block: Block, bounds: (f64, f64), start: f64) -> Slot {
        let idx = self.n_free();
        self.free_ids.push(vec![id.clone()]);
        self.lower.push(bounds.0);
        self.upper.push(bounds.1);
        self.start.push(start);
        let slot = Slot::Free(idx);
        self.entries.push(LayoutEntry { id, block, slot: slot.clone() });
        slot
    }

    fn alias(&mut self, id: ParamId, block: Block, idx: usize) -> Slot {
        self.free_ids[idx].push(id.clone());
        let slot = Slot::Free(idx);
        self.entries.push(LayoutEntry { id, block, slot: slot.clone() });
        slot
    }

    fn fixed(&mut self, id: ParamId, block: Block, value: f64) -> Slot {
        let slot = Slot::Fixed(value);
        self.entries.push(LayoutEntry { id, block, slot: slot.clone() });
        slot
    }

    fn complement(&mut self, id: ParamId, block: Block, idx: Vec<usize>) -> Slot {
        let slot = Slot::Complement(idx);
        self.entries.push(LayoutEntry { id, block, slot: slot.clone() });
        slot
    }

    fn sum(&mut self, id: ParamId, block: Block, idx: Vec<usize>) -> Slot {
        let slot = Slot::Sum(idx);
        self.entries.push(LayoutEntry { id, block, slot: slot.clone() });
        slot
    }

    fn close_block(&mut self, block: Block, begin: usize) {
        let end = self.n_free();
        self.blocks.push((block, begin..end));
    }
}

impl ParamLayout {
    /// Build the layout of a normalized specification.
    ///
    /// Parameters
    /// ----------
    /// - `spec`: `&ModelSpec`
    ///   Output of [`ModelSpec::from_value`].
    ///
    /// Returns
    /// -------
    /// `LayoutResult<ParamLayout>` containing forward and inverse maps,
    /// bounds, start values and numeric slot tables.
    ///
    /// Errors
    /// ------
    /// - `LayoutError::ConflictingNormalization` if aliased occurrences are
    ///   normalized to different values.
    /// - `LayoutError::DuplicateParameter` if two entries share an identity
    ///   (indicates an inconsistent specification).
    pub fn build(spec: &ModelSpec) -> LayoutResult<Self> {
        let var_lb = spec.general.variance_lower_bound();
        let factor_names = spec.factor_names();

        // ---- Measurement occurrences and aliasing classes ----
        let mut uf = UnionFind::new();
        let mut occurrences: Vec<Occurrence> = Vec::new();
        let mut node_of: HashMap<(usize, usize, OccurrenceKind), usize> = HashMap::new();
        let mut first_of_identity: HashMap<(MeasurementIdentity, OccurrenceKind), usize> =
            HashMap::new();
        for (t, equations) in spec.measurement_equations.iter().enumerate() {
            for (j, eq) in equations.iter().enumerate() {
                let identity = eq.identity();
                let mut register = |kind: OccurrenceKind, id: ParamId, fixed: Option<f64>| {
                    let node = uf.add();
                    occurrences.push(Occurrence { id, fixed });
                    node_of.insert((t, j, kind.clone()), node);
                    if spec.general.time_invariant_measurement_system {
                        match first_of_identity.entry((identity.clone(), kind)) {
                            Entry::Occupied(first) => uf.union(*first.get(), node),
                            Entry::Vacant(slot) => {
                                slot.insert(node);
                            }
                        }
                    }
                };
                for (k, &f) in eq.factors.iter().enumerate() {
                    register(
                        OccurrenceKind::Loading(f),
                        ParamId::Loading {
                            period: t,
                            measurement: eq.name.clone(),
                            factor: factor_names[f].clone(),
                        },
                        eq.loading_norms[k],
                    );
                }
                register(
                    OccurrenceKind::Intercept,
                    ParamId::Intercept { period: t, measurement: eq.name.clone() },
                    eq.intercept_norm,
                );
                for c in &eq.controls {
                    register(
                        OccurrenceKind::Control(c.clone()),
                        ParamId::ControlCoeff {
                            period: t,
                            measurement: eq.name.clone(),
                            control: c.clone(),
                        },
                        None,
                    );
                }
                register(
                    OccurrenceKind::Variance,
                    ParamId::MeasVariance { period: t, measurement: eq.name.clone() },
                    None,
                );
            }
        }
        let classes = uf.into_classes();

        let mut class_fixed: Vec<Option<(usize, f64)>> = vec![None; classes.n_classes()];
        for (node, occ) in occurrences.iter().enumerate() {
            let Some(value) = occ.fixed else { continue };
            let class = classes.class_of(node);
            match class_fixed[class] {
                Some((first, first_value)) if first_value != value => {
                    return Err(LayoutError::ConflictingNormalization {
                        first: occurrences[first].id.to_string(),
                        second: occ.id.to_string(),
                        first_value,
                        second_value: value,
                    });
                }
                Some(_) => {}
                None => class_fixed[class] = Some((node, value)),
            }
        }

        // ---- Allocation in block order ----
        let mut b = Builder::new();
        let mut class_slot: Vec<Option<Slot>> = vec![None; classes.n_classes()];
        let mut place = |b: &mut Builder, node: usize, block: Block, bounds: (f64, f64), start: f64| {
            let class = classes.class_of(node);
            let id = occurrences[node].id.clone();
            if let Some((_, value)) = class_fixed[class] {
                let slot = b.fixed(id, block, value);
                class_slot[class] = Some(slot);
                return;
            }
            match class_slot[class].as_ref().and_then(Slot::free_index) {
                Some(idx) => {
                    b.alias(id, block, idx);
                }
                None => {
                    let slot = b.free(id, block, bounds, start);
                    class_slot[class] = Some(slot);
                }
            }
        };

        let unbounded = (f64::NEG_INFINITY, f64::INFINITY);
        let variance_bounds = (var_lb, f64::INFINITY);
        let measurement_walk = walk_measurements(spec);

        let begin = b.n_free();
        for &(t, j, f) in &measurement_walk {
            let node = node_of[&(t, j, OccurrenceKind::Loading(f))];
            place(&mut b, node, Block::Loadings, unbounded, 1.0);
        }
        b.close_block(Block::Loadings, begin);

        let begin = b.n_free();
        let mut seen: HashSet<(usize, usize)> = HashSet::new();
        for &(t, j, _) in &measurement_walk {
            if !seen.insert((t, j)) {
                continue;
            }
            let eq = &spec.measurement_equations[t][j];
            place(&mut b, node_of[&(t, j, OccurrenceKind::Intercept)], Block::Intercepts, unbounded, 0.0);
            for c in &eq.controls {
                let node = node_of[&(t, j, OccurrenceKind::Control(c.clone()))];
                place(&mut b, node, Block::Intercepts, unbounded, 0.0);
            }
        }
        b.close_block(Block::Intercepts, begin);

        let begin = b.n_free();
        let mut seen: HashSet<(usize, usize)> = HashSet::new();
        for &(t, j, _) in &measurement_walk {
            if !seen.insert((t, j)) {
                continue;
            }
            let node = node_of[&(t, j, OccurrenceKind::Variance)];
            place(&mut b, node, Block::MeasVariances, variance_bounds, 1.0);
        }
        b.close_block(Block::MeasVariances, begin);

        let measurement: Vec<Vec<MeasurementSlots>> = spec
            .measurement_equations
            .iter()
            .enumerate()
            .map(|(t, equations)| {
                equations
                    .iter()
                    .enumerate()
                    .map(|(j, eq)| {
                        let slot = |kind: OccurrenceKind| {
                            let class = classes.class_of(node_of[&(t, j, kind)]);
                            class_slot[class].clone().unwrap_or(Slot::Fixed(0.0))
                        };
                        MeasurementSlots {
                            loadings: eq
                                .factors
                                .iter()
                                .map(|&f| slot(OccurrenceKind::Loading(f)))
                                .collect(),
                            intercept: slot(OccurrenceKind::Intercept),
                            controls: eq
                                .controls
                                .iter()
                                .map(|c| slot(OccurrenceKind::Control(c.clone())))
                                .collect(),
                            variance: slot(OccurrenceKind::Variance),
                        }
                    })
                    .collect()
            })
            .collect();

        // ---- Transition coefficients ----
        let n_stages = spec.n_stages();
        let n_factors = spec.n_factors();
        let stages = spec.transition_stages();
        let mut transition = vec![vec![Vec::new(); n_factors]; n_stages];
        let begin = b.n_free();
        for &stage in &stages {
            for (pos, factor) in spec.factors.iter().enumerate() {
                let included: Vec<String> =
                    factor.included.iter().map(|&p| factor_names[p].clone()).collect();
                let eq = factor.transition;
                let names = eq.coeff_names(&included, &factor.name, stage);
                let bounds = eq.coeff_bounds(included.len());
                let start = eq.start_values(included.len(), factor.own_included_position(pos));
                transition[stage][pos] = names
                    .into_iter()
                    .zip(bounds)
                    .zip(start)
                    .map(|((name, bnd), st)| {
                        let id = ParamId::Transition { stage, factor: factor.name.clone(), name };
                        b.free(id, Block::Transition, bnd, st)
                    })
                    .collect();
            }
        }
        b.close_block(Block::Transition, begin);

        // ---- Shock variances ----
        let mut shock_variance = vec![vec![Slot::Fixed(0.0); n_factors]; n_stages];
        let begin = b.n_free();
        for &stage in &stages {
            for (pos, factor) in spec.factors.iter().enumerate() {
                let id = ParamId::ShockVariance { stage, factor: factor.name.clone() };
                shock_variance[stage][pos] = if factor.transition.is_constant() {
                    b.fixed(id, Block::ShockVariances, 0.0)
                } else {
                    b.free(id, Block::ShockVariances, variance_bounds, 0.1)
                };
            }
        }
        b.close_block(Block::ShockVariances, begin);

        // ---- Initial mixture ----
        let n_mix = spec.general.n_mixture_components;
        let begin = b.n_free();
        let mut weights = Vec::with_capacity(n_mix);
        if n_mix == 1 {
            weights.push(b.fixed(ParamId::MixtureWeight { component: 0 }, Block::Mixture, 1.0));
        } else {
            let mut free_idx = Vec::with_capacity(n_mix - 1);
            for k in 0..n_mix - 1 {
                let slot = b.free(
                    ParamId::MixtureWeight { component: k },
                    Block::Mixture,
                    (0.0, 1.0),
                    1.0 / n_mix as f64,
                );
                free_idx.extend(slot.free_index());
                weights.push(slot);
            }
            weights.push(b.complement(
                ParamId::MixtureWeight { component: n_mix - 1 },
                Block::Mixture,
                free_idx,
            ));
        }
        let mut means: Vec<Vec<Slot>> = Vec::with_capacity(n_mix);
        let mut ordered: Vec<usize> = Vec::with_capacity(n_mix);
        for k in 0..n_mix {
            let row = factor_names
                .iter()
                .enumerate()
                .map(|(f, name)| {
                    let id = ParamId::MixtureMean { component: k, factor: name.clone() };
                    if k == 0 || f != 0 {
                        let slot = b.free(id, Block::Mixture, unbounded, 0.0);
                        if f == 0 {
                            ordered.extend(slot.free_index());
                        }
                        return slot;
                    }
                    let diff = ParamId::MixtureMeanDiff { component: k, factor: name.clone() };
                    let step = b.free(diff, Block::Mixture, (0.0, f64::INFINITY), 0.5);
                    ordered.extend(step.free_index());
                    b.sum(id, Block::Mixture, ordered.clone())
                })
                .collect();
            means.push(row);
        }
        let mut cholesky = Vec::with_capacity(n_mix);
        for k in 0..n_mix {
            let mut tri = Vec::with_capacity(n_factors * (n_factors + 1) / 2);
            for row in 0..n_factors {
                for col in 0..=row {
                    let id = ParamId::MixtureCholesky { component: k, row, col };
                    let slot = if row == col {
                        b.free(id, Block::Mixture, variance_bounds, 1.0)
                    } else {
                        b.free(id, Block::Mixture, unbounded, 0.0)
                    };
                    tri.push((row, col, slot));
                }
            }
            cholesky.push(tri);
        }
        b.close_block(Block::Mixture, begin);
        let mixture = MixtureSlots { weights, means, cholesky };

        // ---- Anchoring ----
        let begin = b.n_free();
        let anchoring = spec.anchoring.as_ref().map(|a| {
            let loadings = a
                .factors
                .iter()
                .map(|&f| {
                    let id = ParamId::AnchoringLoading { factor: factor_names[f].clone() };
                    if a.free_loadings {
                        b.free(id, Block::Anchoring, unbounded, 1.0)
                    } else {
                        b.fixed(id, Block::Anchoring, 1.0)
                    }
                })
                .collect();
            let intercept = if a.use_constant {
                b.free(ParamId::AnchoringIntercept, Block::Anchoring, unbounded, 0.0)
            } else {
                b.fixed(ParamId::AnchoringIntercept, Block::Anchoring, 0.0)
            };
            let controls = spec
                .anchoring_controls()
                .iter()
                .map(|c| {
                    let id = ParamId::AnchoringControl { control: c.clone() };
                    b.free(id, Block::Anchoring, unbounded, 0.0)
                })
                .collect();
            let variance =
                b.free(ParamId::AnchoringVariance, Block::Anchoring, variance_bounds, 1.0);
            AnchoringSlots { loadings, intercept, controls, variance }
        });
        b.close_block(Block::Anchoring, begin);

        let mut positions = HashMap::with_capacity(b.entries.len());
        for (pos, entry) in b.entries.iter().enumerate() {
            if positions.insert(entry.id.clone(), pos).is_some() {
                return Err(LayoutError::DuplicateParameter { name: entry.id.to_string() });
            }
        }

        Ok(Self {
            entries: b.entries,
            positions,
            free_ids: b.free_ids,
            lower: Array1::from(b.lower),
            upper: Array1::from(b.upper),
            start: Array1::from(b.start),
            blocks: b.blocks,
            measurement,
            transition,
            shock_variance,
            mixture,
            anchoring,
        })
    }

    /// Length of the free parameter vector.
    pub fn n_free(&self) -> usize {
        self.free_ids.len()
    }

    /// Forward map: every parameter occurrence in layout order.
    pub fn entries(&self) -> &[LayoutEntry] {
        &self.entries
    }

    /// Forward lookup of one identity.
    pub fn slot(&self, id: &ParamId) -> Option<&Slot> {
        self.positions.get(id).map(|&pos| &self.entries[pos].slot)
    }

    /// Inverse map: all identities sharing free index `idx` (representative first).
    pub fn ids_at(&self, idx: usize) -> &[ParamId] {
        &self.free_ids[idx]
    }

    /// Representative name of every free index.
    pub fn names(&self) -> Vec<String> {
        self.free_ids.iter().map(|ids| ids[0].to_string()).collect()
    }

    /// Groups of identities constrained to be equal (aliased occurrences).
    pub fn equality_groups(&self) -> Vec<Vec<ParamId>> {
        self.free_ids.iter().filter(|ids| ids.len() > 1).cloned().collect()
    }

    pub fn lower_bounds(&self) -> &Array1<f64> {
        &self.lower
    }

    pub fn upper_bounds(&self) -> &Array1<f64> {
        &self.upper
    }

    /// Deterministic start vector (inside the bounds).
    pub fn start_params(&self) -> &Array1<f64> {
        &self.start
    }

    /// Blocks in layout order with their free index ranges.
    pub fn blocks(&self) -> &[(Block, Range<usize>)] {
        &self.blocks
    }

    /// Range of free indices occupied by `block`.
    pub fn block_range(&self, block: Block) -> Range<usize> {
        self.blocks
            .iter()
            .find(|(b, _)| *b == block)
            .map_or(0..0, |(_, r)| r.clone())
    }
}

/// `(period, equation index, factor)` in measurement-block order.
fn walk_measurements(spec: &ModelSpec) -> Vec<(usize, usize, usize)> {
    let mut walk = Vec::new();
    for (pos, factor) in spec.factors.iter().enumerate() {
        for t in 0..spec.n_periods {
            let equations = &spec.measurement_equations[t];
            let mut done = HashSet::new();
            for meas in &factor.measurements[t] {
                if !done.insert(meas) {
                    continue;
                }
                if let Some(j) = equations.iter().position(|eq| &eq.name == meas) {
                    walk.push((t, j, pos));
                }
            }
        }
    }
    walk
}
