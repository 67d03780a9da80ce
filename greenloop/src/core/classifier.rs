//! Deterministic classification of validation diagnostics.
//!
//! Separates "this generated code is wrong" (retryable) from "this harness or
//! environment is broken" (no amount of regenerated code can help). The loop
//! consults this before the retry policy: a systemic match terminates the
//! loop immediately, even in confirm mode.

/// A known failure signature that regeneration cannot fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    /// Lowercase needle matched against the lowercased diagnostic.
    pub needle: &'static str,
    /// Operator-facing explanation of why the loop stopped.
    pub explanation: &'static str,
}

/// Ordered signature table; the first match wins and supplies the
/// explanation. Ordering matters where needles overlap (for example
/// collection errors also mention "error"-prefixed lines).
const SIGNATURES: &[Signature] = &[
    Signature {
        needle: "error collecting",
        explanation: "the test runner failed while collecting tests; the suite cannot even load",
    },
    Signature {
        needle: "errors during collection",
        explanation: "the test runner failed while collecting tests; the suite cannot even load",
    },
    Signature {
        needle: "modulenotfounderror",
        explanation: "a required module is missing from the environment",
    },
    Signature {
        needle: "no module named",
        explanation: "a required module is missing from the environment",
    },
    Signature {
        needle: "importerror",
        explanation: "an import failed; the environment or package layout is broken",
    },
    Signature {
        needle: "internalerror",
        explanation: "the test framework crashed internally",
    },
    Signature {
        needle: "syntaxerror",
        explanation: "a test file contains a syntax error and must be fixed by hand",
    },
    Signature {
        needle: "error: usage:",
        explanation: "the test runner rejected its own configuration or arguments",
    },
    Signature {
        needle: "file or directory not found",
        explanation: "a declared test file does not exist",
    },
    Signature {
        needle: "no tests ran",
        explanation: "the test runner collected zero tests; the validation gate is empty",
    },
    Signature {
        needle: "collected 0 items",
        explanation: "the test runner collected zero tests; the validation gate is empty",
    },
    Signature {
        needle: "timed out",
        explanation: "an external tool exceeded its time budget",
    },
    Signature {
        needle: "timeout",
        explanation: "an external tool exceeded its time budget",
    },
];

/// Match diagnostic text against the signature table.
///
/// Returns the first matching signature, or `None` when the failure looks
/// like an ordinary red test that another generation attempt could fix.
pub fn classify(diagnostic: &str) -> Option<&'static Signature> {
    let haystack = diagnostic.to_lowercase();
    SIGNATURES
        .iter()
        .find(|signature| haystack.contains(signature.needle))
}
