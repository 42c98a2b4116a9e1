//! Cache key derivation.

use tessera_core::cell::MatrixCell;

/// Derive the cache key for a cell.
///
/// The key is a pure function of `{ref, runtime, comms}`. The os and mpi
/// attributes are deliberately excluded: a linux cell and a macos cell with
/// the same runtime and comms mode share one entry, trading occasional
/// unusable restores on divergent OS families for a warmer cache. Callers
/// must tolerate the resulting misses. Widening the key is a breaking
/// change to that trade-off and needs its own decision.
pub fn resolve(git_ref: &str, cell: &MatrixCell) -> String {
    format!(
        "deps-{}-py{}-{}",
        sanitize(git_ref),
        cell.runtime,
        cell.comms
    )
}

/// Sanitize a key component for use in filenames.
pub fn sanitize(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}
