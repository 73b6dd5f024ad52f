// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! BOAW Privacy Tests (ADR-0007 §10)
//!
//! Tests for mind mode enforcement and claim merging:
//! - ForbiddenInLedger atoms rejected in mind mode
//! - Invalid proofs quarantined during claim merge
//! - Conflicting valid claims produce conflict artifacts
//! - Commitments are dictionary-safe with pepper

mod common;

// =============================================================================
// T7: Privacy: Mind vs Diagnostics
// =============================================================================

#[test]
#[ignore = "BOAW privacy enforcement not yet implemented"]
fn t7_1_mind_mode_forbids_forbidden_in_ledger_atoms() {
    // Given: attempt to emit attachment bytes of forbidden type
    // Expect: deterministic rejection (error) OR forced indirection
    //         (commitment/proof/private_ref)
    //
    // In mind mode, the ledger must be publishable. Therefore:
    // - No SSNs, credit cards, nude images, private chats, etc.
    // - Only: commitments, ZK proofs (or proof hashes), opaque private refs,
    //   policy hashes, canonical metadata
    unimplemented!(
        "Implement: in mind mode, attempt to emit ForbiddenInLedger atom bytes; \
         assert deterministic rejection or forced indirection"
    );
}

#[test]
#[ignore = "BOAW claim merging not yet implemented"]
fn t7_2_invalid_proofs_do_not_win_claim_merge() {
    // Given: same claim_key, one valid proof, one invalid
    // Expect: merge selects valid; invalid produces audit artifact or
    //         is excluded by policy
    //
    // During collapse for a claim_key:
    // - verify proofs
    // - if invalid: quarantine (not canonical)
    // - if multiple valid proofs with same statement: dedupe
    unimplemented!(
        "Implement: same claim_key, one valid proof, one invalid; \
         merge keeps valid, quarantines invalid deterministically"
    );
}

#[test]
#[ignore = "BOAW claim merging not yet implemented"]
fn t7_3_conflicting_valid_claims_produce_conflict_artifact() {
    // Given: same claim_key, different statement_hash, both verify
    // Expect: conflict artifact unless policy resolves
    //
    // If multiple valid proofs with different statements: claim conflict →
    // conflict artifact unless a declared deterministic policy resolves
    unimplemented!(
        "Implement: same claim_key, two different statement_hash, both verify; \
         conflict artifact unless policy resolves"
    );
}

#[test]
#[ignore = "BOAW commitment pepper not yet implemented"]
fn t7_4_commitment_is_dictionary_safe_with_pepper() {
    // Commitments must be dictionary-safe.
    // Never commit as H(secret) for guessable secrets.
    //
    // Use:
    // - secret pepper (not recorded in ledger), e.g. H(pepper || canonical(secret))
    // - OR commitment to encrypted payload stored in vault
    //
    // Given: known secret and commitment
    // Expect: commitment changes when pepper changes; cannot be reproduced
    //         without pepper
    unimplemented!("Implement: commit(secret, pepper1) != commit(secret, pepper2)");
}

// =============================================================================
// Atom type policy (§3)
// =============================================================================

#[test]
#[ignore = "BOAW type registry not yet implemented"]
fn atom_type_declares_sensitivity() {
    // Each Atom type MUST declare (via registry metadata):
    // - Sensitivity: Public | Private | ForbiddenInLedger
    //
    // Verify the registry enforces this requirement.
    unimplemented!(
        "Implement: register atom type with sensitivity; \
         verify registry accepts/rejects based on declaration"
    );
}

#[test]
#[ignore = "BOAW type registry not yet implemented"]
fn atom_type_declares_merge_behavior() {
    // Each Atom type MUST declare:
    // - MergeBehavior: Mergeable | LWW | ConflictOnly
    unimplemented!(
        "Implement: register atom type with merge behavior; \
         verify collapse respects declared behavior"
    );
}

#[test]
#[ignore = "BOAW type registry not yet implemented"]
fn atom_type_declares_disclosure_policy() {
    // Each Atom type MUST declare:
    // - Disclosure: Never | ByConsent | ByWarrant | DiagnosticsOnly
    unimplemented!(
        "Implement: register atom type with disclosure policy; \
         verify access control respects declaration"
    );
}

// =============================================================================
// ClaimRecord (§10.2)
// =============================================================================

#[test]
#[ignore = "BOAW ClaimRecord not yet implemented"]
fn claim_record_is_canonical() {
    // We record a deterministic claim record:
    // - claim_key (stable identity of the claim)
    // - scheme_id (ZK / verifier identity)
    // - statement_hash (public statement)
    // - commitment (to secret or ciphertext)
    // - proof_bytes OR proof_hash (policy-controlled)
    // - private_ref (optional pointer into erasable vault)
    // - policy_hash (redaction/disclosure/retention rules)
    // - issuer (rule/subsystem id), tick, etc.
    //
    // Verify all fields are present and deterministically encoded.
    unimplemented!(
        "Implement: create ClaimRecord; \
         verify canonical encoding and all required fields"
    );
}

// =============================================================================
// Diagnostics mode (§3, §10.1)
// =============================================================================

#[test]
#[ignore = "BOAW diagnostics mode not yet implemented"]
fn diagnostics_mode_allows_richer_introspection() {
    // Diagnostics mode: richer data MAY be permitted, but still governed by
    // type policy (no "oops logged SSN" allowed).
    //
    // Verify that diagnostics mode enables additional data access while
    // still respecting type-level sensitivity declarations.
    unimplemented!(
        "Implement: in diagnostics mode, verify additional access is granted \
         for DiagnosticsOnly types while ForbiddenInLedger still rejected"
    );
}
