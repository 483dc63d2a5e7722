//! Elementary reaction steps.
//!
//! A [`SimpleStep`] owns the stoichiometry of one elementary reaction, e.g.
//! `aA + bB -> cC + dD`, together with its forward and reverse rate
//! constants, and derives the per-species rate contributions under
//! mass-action kinetics.

use std::fmt;
use std::ops::Add;

use indexmap::map::Entry;
use indexmap::IndexMap;
use itertools::Itertools;
use num_rational::Rational64;
use num_traits::{One, Zero};

use crate::expression::RateExpr;
use crate::model::RateModel;

/// Mapping from species name to its (exact, rational) stoichiometric
/// coefficient. Insertion order is preserved.
pub type StoichiometricMap = IndexMap<String, Rational64>;

/// Lossless enough for any realistic stoichiometric coefficient.
pub(crate) fn ratio_to_f64(ratio: &Rational64) -> f64 {
    *ratio.numer() as f64 / *ratio.denom() as f64
}

fn is_liquid_or_solid(species: &str) -> bool {
    species.contains("(l)") || species.contains("(s)")
}

fn accumulate(map: &mut StoichiometricMap, species: String, coefficient: Rational64) {
    *map.entry(species).or_insert_with(Rational64::zero) += coefficient;
}

/// A single step in a mechanism, with mass-action participants kept apart
/// from liquid/solid-phase species (which never enter a rate term).
///
/// Stoichiometry is immutable after construction; only the rate constants
/// `kf` and `kr` may be set afterwards.
#[derive(Debug, Clone)]
pub struct SimpleStep {
    reactants: StoichiometricMap,
    products: StoichiometricMap,
    liquid_solid_reactants: StoichiometricMap,
    liquid_solid_products: StoichiometricMap,
    kf: f64,
    kr: f64,
}

impl SimpleStep {
    /// Creates a step from reactant and product coefficient maps.
    ///
    /// Species carrying a `(l)` or `(s)` phase marker are routed into the
    /// liquid/solid maps; repeated species accumulate by summation. Both
    /// rate constants start at 0.
    pub fn new(reactants: StoichiometricMap, products: StoichiometricMap) -> Self {
        let mut step = Self {
            reactants: StoichiometricMap::new(),
            products: StoichiometricMap::new(),
            liquid_solid_reactants: StoichiometricMap::new(),
            liquid_solid_products: StoichiometricMap::new(),
            kf: 0.0,
            kr: 0.0,
        };

        for (species, coefficient) in reactants {
            if is_liquid_or_solid(&species) {
                accumulate(&mut step.liquid_solid_reactants, species, coefficient);
            } else {
                accumulate(&mut step.reactants, species, coefficient);
            }
        }
        for (species, coefficient) in products {
            if is_liquid_or_solid(&species) {
                accumulate(&mut step.liquid_solid_products, species, coefficient);
            } else {
                accumulate(&mut step.products, species, coefficient);
            }
        }

        step
    }

    /// Mass-action reactants.
    pub fn reactants(&self) -> &StoichiometricMap {
        &self.reactants
    }

    /// Mass-action products.
    pub fn products(&self) -> &StoichiometricMap {
        &self.products
    }

    /// Reactants excluded from rate terms by their phase marker.
    pub fn liquid_solid_reactants(&self) -> &StoichiometricMap {
        &self.liquid_solid_reactants
    }

    /// Products excluded from rate terms by their phase marker.
    pub fn liquid_solid_products(&self) -> &StoichiometricMap {
        &self.liquid_solid_products
    }

    pub fn kf(&self) -> f64 {
        self.kf
    }

    pub fn kr(&self) -> f64 {
        self.kr
    }

    /// Sets the forward and reverse rate constants.
    pub fn set_rate_constants(&mut self, kf: f64, kr: f64) {
        self.kf = kf;
        self.kr = kr;
    }

    /// Sets the rate constants from an equilibrium constant, normalized to a
    /// given `kr`. `k_eq` is mathematically equivalent to `kf / kr`.
    pub fn set_rate_constants_from_equilibrium(&mut self, k_eq: f64, normalizing_kr: f64) {
        self.kr = normalizing_kr;
        self.kf = k_eq * self.kr;
    }

    /// The mass-action term of one side: the product over its participants
    /// of `concentration ^ coefficient`. An empty side contributes the
    /// multiplicative identity.
    fn mass_action(side: &StoichiometricMap) -> RateExpr {
        if side.is_empty() {
            return RateExpr::Constant(1.0);
        }
        RateExpr::Product(
            side.iter()
                .map(|(species, coefficient)| {
                    RateExpr::Power(
                        Box::new(RateExpr::concentration(species.clone())),
                        ratio_to_f64(coefficient),
                    )
                })
                .collect(),
        )
    }

    fn scaled(factor: f64, action: &RateExpr) -> RateExpr {
        RateExpr::Product(vec![RateExpr::Constant(factor), action.clone()])
    }

    /// The contribution of a species consumed on the reactant side with
    /// coefficient `c`: `-c*kf*reactantMassAction + c*kr*productMassAction`.
    fn reactant_contribution(
        &self,
        coefficient: &Rational64,
        reactant_action: &RateExpr,
        product_action: &RateExpr,
    ) -> RateExpr {
        let c = ratio_to_f64(coefficient);
        RateExpr::sum([
            Self::scaled(-c * self.kf, reactant_action),
            Self::scaled(c * self.kr, product_action),
        ])
    }

    /// The mirrored contribution of a species produced on the product side.
    fn product_contribution(
        &self,
        coefficient: &Rational64,
        reactant_action: &RateExpr,
        product_action: &RateExpr,
    ) -> RateExpr {
        let c = ratio_to_f64(coefficient);
        RateExpr::sum([
            Self::scaled(c * self.kf, reactant_action),
            Self::scaled(-c * self.kr, product_action),
        ])
    }
}

impl RateModel for SimpleStep {
    /// Derives one differential equation per mass-action participant.
    ///
    /// A species appearing on both sides receives the sum of both roles'
    /// contributions, each evaluated with its own coefficient, so nothing is
    /// double-counted. Liquid/solid species receive no equation.
    fn differential_equations(&self) -> IndexMap<String, RateExpr> {
        let reactant_action = Self::mass_action(&self.reactants);
        let product_action = Self::mass_action(&self.products);

        let mut odes: IndexMap<String, RateExpr> = IndexMap::new();
        for (species, coefficient) in &self.reactants {
            odes.insert(
                species.clone(),
                self.reactant_contribution(coefficient, &reactant_action, &product_action),
            );
        }
        for (species, coefficient) in &self.products {
            let contribution =
                self.product_contribution(coefficient, &reactant_action, &product_action);
            match odes.entry(species.clone()) {
                Entry::Occupied(mut entry) => {
                    let combined = RateExpr::sum([entry.get().clone(), contribution]);
                    entry.insert(combined);
                }
                Entry::Vacant(entry) => {
                    entry.insert(contribution);
                }
            }
        }

        odes
    }

    /// Derives the equation of a single species without building the full
    /// map. Algebraically identical to looking the species up in
    /// [`differential_equations`](RateModel::differential_equations).
    fn differential_equation_of(&self, species: &str) -> RateExpr {
        let reactant_action = Self::mass_action(&self.reactants);
        let product_action = Self::mass_action(&self.products);

        let mut contributions = Vec::new();
        if let Some(coefficient) = self.reactants.get(species) {
            contributions.push(self.reactant_contribution(
                coefficient,
                &reactant_action,
                &product_action,
            ));
        }
        if let Some(coefficient) = self.products.get(species) {
            contributions.push(self.product_contribution(
                coefficient,
                &reactant_action,
                &product_action,
            ));
        }
        RateExpr::sum(contributions)
    }
}

impl Add for SimpleStep {
    type Output = SimpleStep;

    /// Merges two steps by summing coefficients of repeated species.
    /// The resulting step starts with both rate constants at 0.
    fn add(self, other: SimpleStep) -> SimpleStep {
        let mut reactants = self.reactants;
        reactants.extend(self.liquid_solid_reactants);
        for (species, coefficient) in other
            .reactants
            .into_iter()
            .chain(other.liquid_solid_reactants)
        {
            accumulate(&mut reactants, species, coefficient);
        }

        let mut products = self.products;
        products.extend(self.liquid_solid_products);
        for (species, coefficient) in other
            .products
            .into_iter()
            .chain(other.liquid_solid_products)
        {
            accumulate(&mut products, species, coefficient);
        }

        SimpleStep::new(reactants, products)
    }
}

/// Equality is stoichiometry only; rate constants are deliberately ignored.
impl PartialEq for SimpleStep {
    fn eq(&self, other: &Self) -> bool {
        self.reactants == other.reactants
            && self.products == other.products
            && self.liquid_solid_reactants == other.liquid_solid_reactants
            && self.liquid_solid_products == other.liquid_solid_products
    }
}

fn side_to_string(mass_action: &StoichiometricMap, phase: &StoichiometricMap) -> String {
    mass_action
        .iter()
        .chain(phase.iter())
        .map(|(species, coefficient)| {
            if coefficient.is_one() {
                species.clone()
            } else {
                format!("{}{}", coefficient, species)
            }
        })
        .join(" + ")
}

impl fmt::Display for SimpleStep {
    /// Renders `aA + bB -> cC + dD`; fractional coefficients keep their
    /// `p/q` notation, unit coefficients are omitted.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}",
            side_to_string(&self.reactants, &self.liquid_solid_reactants),
            side_to_string(&self.products, &self.liquid_solid_products),
        )
    }
}
