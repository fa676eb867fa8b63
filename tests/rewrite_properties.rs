//! Property-based tests for the rewrite engine
//!
//! Generated packages are call chains from an entry point down to a
//! `database/sql` call. For every such package:
//! - Rewriting twice gives the same output as rewriting once
//! - No original handle method survives on the handle
//! - Every call to an augmented function passes `ctx` first
//! - `main` never gains a parameter
//! - The context package is imported exactly once

mod common;

use common::rewrite_source;
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Entry {
    Main,
    HttpHandler,
}

const METHODS: &[&str] = &["Query", "Exec", "Prepare", "QueryRow"];

fn entry() -> impl Strategy<Value = Entry> {
    prop_oneof![Just(Entry::Main), Just(Entry::HttpHandler)]
}

/// Build a package whose entry calls helper0, helper0 calls helper1, and so
/// on, with the last helper calling the handle
fn chain_package(entry: Entry, depth: usize, method: &str, single_line: bool) -> String {
    let mut source = String::from(
        "package main\n\nimport (\n\t\"database/sql\"\n\t\"net/http\"\n)\n\nvar db *sql.DB\n\nvar _ = http.StatusOK\n",
    );
    let body = |stmt: &str| {
        if single_line {
            format!("{{ {} }}", stmt)
        } else {
            format!("{{\n\t{}\n}}", stmt)
        }
    };

    let signature = match entry {
        Entry::Main => "func main()".to_string(),
        Entry::HttpHandler => "func serve(w http.ResponseWriter, r *http.Request)".to_string(),
    };
    source.push_str(&format!("\n{} {}\n", signature, body("helper0()")));

    for level in 0..depth {
        let stmt = if level + 1 == depth {
            format!("db.{}(\"SELECT {}\")", method, level)
        } else {
            format!("helper{}()", level + 1)
        };
        source.push_str(&format!("\nfunc helper{}() {}\n", level, body(&stmt)));
    }
    source
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_rewrite_is_idempotent(
        entry in entry(),
        depth in 1usize..5,
        method in prop::sample::select(METHODS),
        single_line in any::<bool>()
    ) {
        let once = rewrite_source(&chain_package(entry, depth, method, single_line));
        let twice = rewrite_source(&once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_chain_is_consistent(
        entry in entry(),
        depth in 1usize..5,
        method in prop::sample::select(METHODS),
        single_line in any::<bool>()
    ) {
        let output = rewrite_source(&chain_package(entry, depth, method, single_line));

        let stray = format!("db.{}(", method);
        let retargeted = format!("db.{}Context(ctx, ", method);
        prop_assert!(!output.contains(&stray), "stray {} call", method);
        prop_assert!(output.contains(&retargeted), "missing {}Context call", method);

        for level in 0..depth {
            let declaration = format!("func helper{}(ctx context.Context)", level);
            prop_assert!(output.contains(&declaration), "missing {}", declaration);
            let call = format!("helper{}(", level);
            for (at, _) in output.match_indices(&call) {
                // Skip the declaration itself
                if output[..at].ends_with("func ") {
                    continue;
                }
                let args = &output[at + call.len()..];
                prop_assert!(args.starts_with("ctx"), "unpatched call at {}", at);
            }
        }

        let expected_entry = match entry {
            Entry::Main => "func main() ",
            Entry::HttpHandler => {
                "func serve(w http.ResponseWriter, r *http.Request) {\n\tctx := r.Context()\n"
            }
        };
        prop_assert!(output.contains(expected_entry), "entry point changed for {:?}", entry);
        let context_imports = output.matches("\"context\"").count();
        prop_assert_eq!(context_imports, 1);
    }
}
