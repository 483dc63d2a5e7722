//! Parsing of the chemical equation grammar.
//!
//! ```text
//! mechanism   := step ('\n' step)*
//! step        := side '->' side
//! side        := term ('+' term)*
//! term        := [coefficient] species
//! coefficient := integer | integer '/' integer
//! ```
//!
//! Whitespace and tabs are stripped before parsing. Species names are not
//! validated against an element vocabulary; any token free of `+` and `->`
//! is accepted. Parsing is pure: on failure no partial step or mechanism is
//! returned.

use std::str::FromStr;

use lazy_static::lazy_static;
use num_rational::Rational64;
use regex::Regex;
use thiserror::Error;

use crate::mechanism::ReactionMechanism;
use crate::step::{SimpleStep, StoichiometricMap};

lazy_static! {
    /// Leading numeral or numeral-with-slash; absence implies coefficient 1.
    static ref COEFFICIENT_RE: Regex = Regex::new(r"^([0-9]+)(?:/([0-9]+))?").unwrap();
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("step '{step}' is missing the '->' separator")]
    MissingArrow { step: String },
    #[error("step '{step}' contains more than one '->' separator")]
    ExtraArrow { step: String },
    #[error("step '{step}' has an empty side")]
    EmptySide { step: String },
    #[error("step '{step}' contains an empty term")]
    EmptyTerm { step: String },
    #[error("term '{term}' has a coefficient but no species name")]
    MissingSpecies { term: String },
    #[error("term '{term}' has an invalid coefficient: {reason}")]
    InvalidCoefficient { term: String, reason: String },
    #[error("mechanism text contains no steps")]
    EmptyMechanism,
}

/// Parses `aA + bB` into a stoichiometric map, accumulating repeated
/// species by summation. `step` is carried along for error reporting only.
fn parse_side(side: &str, step: &str) -> Result<StoichiometricMap, ParseError> {
    if side.is_empty() {
        return Err(ParseError::EmptySide {
            step: step.to_string(),
        });
    }

    let mut coefficients = StoichiometricMap::new();
    for term in side.split('+') {
        if term.is_empty() {
            return Err(ParseError::EmptyTerm {
                step: step.to_string(),
            });
        }
        let (coefficient, species) = parse_term(term)?;
        *coefficients
            .entry(species.to_string())
            .or_insert_with(|| Rational64::from_integer(0)) += coefficient;
    }

    Ok(coefficients)
}

/// Splits a term into its coefficient and species name. The coefficient is
/// the leading `p` or `p/q` numeral match; everything after it is the name.
fn parse_term(term: &str) -> Result<(Rational64, &str), ParseError> {
    let Some(captures) = COEFFICIENT_RE.captures(term) else {
        return Ok((Rational64::from_integer(1), term));
    };

    let numerator: i64 = parse_integer(&captures[1], term)?;
    let denominator: i64 = match captures.get(2) {
        Some(denominator) => parse_integer(denominator.as_str(), term)?,
        None => 1,
    };
    if denominator == 0 {
        return Err(ParseError::InvalidCoefficient {
            term: term.to_string(),
            reason: "denominator is zero".to_string(),
        });
    }

    let species = &term[captures[0].len()..];
    if species.is_empty() {
        return Err(ParseError::MissingSpecies {
            term: term.to_string(),
        });
    }

    Ok((Rational64::new(numerator, denominator), species))
}

fn parse_integer(digits: &str, term: &str) -> Result<i64, ParseError> {
    digits
        .parse()
        .map_err(|err| ParseError::InvalidCoefficient {
            term: term.to_string(),
            reason: format!("{}", err),
        })
}

impl FromStr for SimpleStep {
    type Err = ParseError;

    /// Parses a single step of the form `aA + bB -> cC + dD`.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let stripped: String = text.chars().filter(|c| *c != ' ' && *c != '\t').collect();

        let sides: Vec<&str> = stripped.split("->").collect();
        let (reactants, products) = match sides.as_slice() {
            [reactants, products] => (*reactants, *products),
            [_] => {
                return Err(ParseError::MissingArrow {
                    step: stripped.clone(),
                })
            }
            _ => {
                return Err(ParseError::ExtraArrow {
                    step: stripped.clone(),
                })
            }
        };

        Ok(SimpleStep::new(
            parse_side(reactants, &stripped)?,
            parse_side(products, &stripped)?,
        ))
    }
}

impl FromStr for ReactionMechanism {
    type Err = ParseError;

    /// Parses one step per line; blank lines are skipped.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let steps: Vec<SimpleStep> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::parse)
            .collect::<Result<_, _>>()?;

        if steps.is_empty() {
            return Err(ParseError::EmptyMechanism);
        }

        Ok(ReactionMechanism::new(steps))
    }
}
