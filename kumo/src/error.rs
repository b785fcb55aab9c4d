use crate::code_writer::CodeWriterError;
use crate::graph::Kind;
use crate::ir::{Endpoint, Location};

use thiserror::Error;

use std::io;

/// A structural defect in a module's update routine or hierarchy, found before any simulation runs.
#[derive(Error, Clone, Debug, Eq, PartialEq)]
pub enum TranslationError {
    #[error("Cannot translate module \"{module}\": the {endpoint} of \"{signal}\" is read at {location}, but it hasn't been assigned at that point.")]
    UninitializedRead {
        module: String,
        signal: String,
        endpoint: Endpoint,
        location: Location,
    },

    #[error("Cannot translate module \"{module}\": \"{signal}\" isn't assigned on every path, which would infer a latch (unassigned along {path}).")]
    LatchInferred {
        module: String,
        signal: String,
        path: String,
    },

    #[error("Cannot translate module \"{module}\": the match at {location} doesn't cover {} and has no catch-all arm.", .missing.join(", "))]
    NonExhaustiveMatch {
        module: String,
        location: Location,
        missing: Vec<String>,
    },

    #[error("Cannot translate module \"{module}\": \"{signal}\" is driven the wrong way at {location}; {reason}.")]
    DirectionMismatch {
        module: String,
        signal: String,
        location: Location,
        reason: String,
    },

    #[error("Cannot translate module \"{module}\": interfaces \"{a}\" and \"{b}\" joined at {location} have different members ({} only on one side).", .missing.join(", "))]
    SignalSetMismatch {
        module: String,
        location: Location,
        a: String,
        b: String,
        missing: Vec<String>,
    },

    #[error("Cannot translate module \"{module}\": member \"{member}\" of interfaces \"{a}\" and \"{b}\" joined at {location} has {a_kind} on one side and {b_kind} on the other.")]
    KindMismatch {
        module: String,
        location: Location,
        a: String,
        b: String,
        member: String,
        a_kind: Kind,
        b_kind: Kind,
    },

    #[error("Cannot translate module \"{module}\": \"{signal}\" has more than one driver.")]
    MultipleDrivers { module: String, signal: String },

    #[error("Cannot translate module \"{module}\": input \"{port}\" of instance \"{instance}\" is not driven.")]
    UndrivenInput {
        module: String,
        instance: String,
        port: String,
    },

    #[error("Cannot translate module \"{module}\": it has a recursive definition formed by the instance path \"{path}\".")]
    RecursiveInstantiation { module: String, path: String },
}

/// A failure of a single simulation run. The run is aborted; other runs over the same design are unaffected.
#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("Simulation \"{run}\" didn't converge within {iterations} pass(es) at step {step}.")]
    ConvergenceTimeout {
        run: String,
        step: u64,
        iterations: usize,
    },

    #[error("Simulation \"{run}\": combinational signal \"{signal}\" was left without a value at step {step}, so its current and next values diverge.")]
    CombinationalDivergence {
        run: String,
        step: u64,
        signal: String,
    },

    #[error("Simulation \"{run}\" doesn't have a signal called \"{path}\".")]
    UnknownSignal { run: String, path: String },

    #[error("Simulation \"{run}\": \"{path}\" isn't an input of the top-level module.")]
    NotAnInput { run: String, path: String },

    #[error("Simulation \"{run}\": the value '{value}' doesn't fit into \"{path}\", which has {bit_width} bit(s).")]
    ValueOutOfRange {
        run: String,
        path: String,
        value: u128,
        bit_width: u32,
    },

    #[error("Simulation \"{run}\": the value '{value}' isn't a valid value of {kind}, which \"{path}\" has.")]
    InvalidValue {
        run: String,
        path: String,
        value: u128,
        kind: Kind,
    },

    #[error("Simulation \"{run}\" was aborted by an earlier error and must be reset.")]
    Aborted { run: String },

    #[error("trace I/O error")]
    Trace(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Translation(#[from] TranslationError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error(transparent)]
    CodeWriter(#[from] CodeWriterError),
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::ir::Step;

    #[test]
    fn messages_name_module_and_location() {
        let error = TranslationError::UninitializedRead {
            module: "A".into(),
            signal: "tmp".into(),
            endpoint: Endpoint::Current,
            location: Location(vec![Step::Statement(2), Step::Arm("then".into())]),
        };

        assert_eq!(
            error.to_string(),
            "Cannot translate module \"A\": the current value of \"tmp\" is read at update/2/then, but it hasn't been assigned at that point."
        );

        let error = TranslationError::NonExhaustiveMatch {
            module: "Fsm".into(),
            location: Location(vec![Step::Statement(0)]),
            missing: vec!["Busy".into(), "Done".into()],
        };

        assert_eq!(
            error.to_string(),
            "Cannot translate module \"Fsm\": the match at update/0 doesn't cover Busy, Done and has no catch-all arm."
        );
    }

    #[test]
    fn invalid_value_names_kind() {
        let error = SimulationError::InvalidValue {
            run: "sim".into(),
            path: "s".into(),
            value: 3,
            kind: Kind::Bits(2),
        };

        assert!(error.to_string().starts_with("Simulation \"sim\": the value '3' isn't a valid value of "));
    }

    #[test]
    fn umbrella_error_is_transparent() {
        let error: Error = SimulationError::Aborted { run: "sim".into() }.into();

        assert_eq!(
            error.to_string(),
            "Simulation \"sim\" was aborted by an earlier error and must be reset."
        );
    }
}
