//! Signatures of the out-of-package APIs the rewriter cares about.
//!
//! Packages outside the one being rewritten are not loaded, so the handful
//! of functions and methods that produce database handles are described
//! here. Result lists use a compact notation: `*Rows` is a pointer to a
//! type of the same package, `database/sql.Result` is fully qualified.

use super::{GoType, NamedType, Signature};

pub const DATABASE_SQL: &str = "database/sql";
pub const SQLX: &str = "github.com/jmoiron/sqlx";
pub const NET_HTTP: &str = "net/http";
pub const ECHO: &str = "github.com/labstack/echo/v4";
pub const CONTEXT: &str = "context";

struct ExternalFunc {
    package: &'static str,
    name: &'static str,
    results: &'static str,
}

struct ExternalType {
    package: &'static str,
    name: &'static str,
    /// Embedded fields, promoted by name and by member lookup
    embeds: &'static [&'static str],
    fields: &'static [(&'static str, &'static str)],
    methods: &'static [(&'static str, &'static str)],
}

const SQL_QUERY_METHODS: &[(&str, &str)] = &[
    ("Exec", "Result, error"),
    ("ExecContext", "Result, error"),
    ("Prepare", "*Stmt, error"),
    ("PrepareContext", "*Stmt, error"),
    ("Query", "*Rows, error"),
    ("QueryContext", "*Rows, error"),
    ("QueryRow", "*Row"),
    ("QueryRowContext", "*Row"),
];

const FUNCS: &[ExternalFunc] = &[
    ExternalFunc { package: DATABASE_SQL, name: "Open", results: "*DB, error" },
    ExternalFunc { package: DATABASE_SQL, name: "OpenDB", results: "*DB" },
    ExternalFunc { package: SQLX, name: "Open", results: "*DB, error" },
    ExternalFunc { package: SQLX, name: "Connect", results: "*DB, error" },
    ExternalFunc { package: SQLX, name: "ConnectContext", results: "*DB, error" },
    ExternalFunc { package: SQLX, name: "MustConnect", results: "*DB" },
    ExternalFunc { package: SQLX, name: "MustOpen", results: "*DB" },
    ExternalFunc { package: SQLX, name: "NewDb", results: "*DB" },
    ExternalFunc { package: SQLX, name: "Get", results: "error" },
    ExternalFunc { package: SQLX, name: "Select", results: "error" },
    ExternalFunc { package: SQLX, name: "In", results: "string, []any, error" },
    ExternalFunc { package: SQLX, name: "Named", results: "string, []any, error" },
    ExternalFunc { package: CONTEXT, name: "Background", results: "Context" },
    ExternalFunc { package: CONTEXT, name: "TODO", results: "Context" },
];

const TYPES: &[ExternalType] = &[
    ExternalType {
        package: DATABASE_SQL,
        name: "DB",
        embeds: &[],
        fields: &[],
        methods: &[
            ("Begin", "*Tx, error"),
            ("BeginTx", "*Tx, error"),
            ("Close", "error"),
            ("Conn", "*Conn, error"),
            ("Ping", "error"),
            ("PingContext", "error"),
            ("SetConnMaxIdleTime", ""),
            ("SetConnMaxLifetime", ""),
            ("SetMaxIdleConns", ""),
            ("SetMaxOpenConns", ""),
            ("Stats", "DBStats"),
        ],
    },
    ExternalType {
        package: DATABASE_SQL,
        name: "Tx",
        embeds: &[],
        fields: &[],
        methods: &[
            ("Commit", "error"),
            ("Rollback", "error"),
            ("Stmt", "*Stmt"),
            ("StmtContext", "*Stmt"),
        ],
    },
    ExternalType {
        package: DATABASE_SQL,
        name: "Conn",
        embeds: &[],
        fields: &[],
        methods: &[("BeginTx", "*Tx, error"), ("Close", "error"), ("PingContext", "error")],
    },
    ExternalType {
        package: DATABASE_SQL,
        name: "Stmt",
        embeds: &[],
        fields: &[],
        methods: &[
            ("Close", "error"),
            ("Exec", "Result, error"),
            ("ExecContext", "Result, error"),
            ("Query", "*Rows, error"),
            ("QueryContext", "*Rows, error"),
            ("QueryRow", "*Row"),
            ("QueryRowContext", "*Row"),
        ],
    },
    ExternalType {
        package: DATABASE_SQL,
        name: "Rows",
        embeds: &[],
        fields: &[],
        methods: &[
            ("Close", "error"),
            ("Columns", "[]string, error"),
            ("Err", "error"),
            ("Next", "bool"),
            ("NextResultSet", "bool"),
            ("Scan", "error"),
        ],
    },
    ExternalType {
        package: DATABASE_SQL,
        name: "Row",
        embeds: &[],
        fields: &[],
        methods: &[("Err", "error"), ("Scan", "error")],
    },
    ExternalType {
        package: SQLX,
        name: "DB",
        embeds: &["*database/sql.DB"],
        fields: &[("Mapper", "*github.com/jmoiron/sqlx/reflectx.Mapper")],
        methods: &[
            ("Beginx", "*Tx, error"),
            ("BeginTxx", "*Tx, error"),
            ("Connx", "*Conn, error"),
            ("DriverName", "string"),
            ("Get", "error"),
            ("GetContext", "error"),
            ("MustBegin", "*Tx"),
            ("MustBeginTx", "*Tx"),
            ("MustExec", "database/sql.Result"),
            ("MustExecContext", "database/sql.Result"),
            ("NamedExec", "database/sql.Result, error"),
            ("NamedExecContext", "database/sql.Result, error"),
            ("NamedQuery", "*Rows, error"),
            ("NamedQueryContext", "*Rows, error"),
            ("PrepareNamed", "*NamedStmt, error"),
            ("PrepareNamedContext", "*NamedStmt, error"),
            ("Preparex", "*Stmt, error"),
            ("PreparexContext", "*Stmt, error"),
            ("QueryRowx", "*Row"),
            ("QueryRowxContext", "*Row"),
            ("Queryx", "*Rows, error"),
            ("QueryxContext", "*Rows, error"),
            ("Rebind", "string"),
            ("Select", "error"),
            ("SelectContext", "error"),
            ("Unsafe", "*DB"),
        ],
    },
    ExternalType {
        package: SQLX,
        name: "Tx",
        embeds: &["*database/sql.Tx"],
        fields: &[],
        methods: &[
            ("DriverName", "string"),
            ("Get", "error"),
            ("GetContext", "error"),
            ("MustExec", "database/sql.Result"),
            ("MustExecContext", "database/sql.Result"),
            ("NamedExec", "database/sql.Result, error"),
            ("NamedExecContext", "database/sql.Result, error"),
            ("NamedQuery", "*Rows, error"),
            ("NamedQueryContext", "*Rows, error"),
            ("NamedStmt", "*NamedStmt"),
            ("NamedStmtContext", "*NamedStmt"),
            ("PrepareNamed", "*NamedStmt, error"),
            ("PrepareNamedContext", "*NamedStmt, error"),
            ("Preparex", "*Stmt, error"),
            ("PreparexContext", "*Stmt, error"),
            ("QueryRowx", "*Row"),
            ("QueryRowxContext", "*Row"),
            ("Queryx", "*Rows, error"),
            ("QueryxContext", "*Rows, error"),
            ("Rebind", "string"),
            ("Select", "error"),
            ("SelectContext", "error"),
            ("Stmtx", "*Stmt"),
            ("StmtxContext", "*Stmt"),
            ("Unsafe", "*Tx"),
        ],
    },
    ExternalType {
        package: SQLX,
        name: "Conn",
        embeds: &["*database/sql.Conn"],
        fields: &[],
        methods: &[
            ("BeginTxx", "*Tx, error"),
            ("GetContext", "error"),
            ("PreparexContext", "*Stmt, error"),
            ("QueryRowxContext", "*Row"),
            ("QueryxContext", "*Rows, error"),
            ("Rebind", "string"),
            ("SelectContext", "error"),
        ],
    },
    ExternalType {
        package: SQLX,
        name: "Stmt",
        embeds: &["*database/sql.Stmt"],
        fields: &[],
        methods: &[
            ("Get", "error"),
            ("GetContext", "error"),
            ("MustExec", "database/sql.Result"),
            ("MustExecContext", "database/sql.Result"),
            ("QueryRowx", "*Row"),
            ("QueryRowxContext", "*Row"),
            ("Queryx", "*Rows, error"),
            ("QueryxContext", "*Rows, error"),
            ("Select", "error"),
            ("SelectContext", "error"),
            ("Unsafe", "*Stmt"),
        ],
    },
    ExternalType {
        package: SQLX,
        name: "NamedStmt",
        embeds: &[],
        fields: &[],
        methods: &[
            ("Close", "error"),
            ("Exec", "database/sql.Result, error"),
            ("ExecContext", "database/sql.Result, error"),
            ("Get", "error"),
            ("GetContext", "error"),
            ("MustExec", "database/sql.Result"),
            ("MustExecContext", "database/sql.Result"),
            ("Query", "*database/sql.Rows, error"),
            ("QueryContext", "*database/sql.Rows, error"),
            ("QueryRowx", "*Row"),
            ("QueryRowxContext", "*Row"),
            ("Queryx", "*Rows, error"),
            ("QueryxContext", "*Rows, error"),
            ("Select", "error"),
            ("SelectContext", "error"),
        ],
    },
    ExternalType {
        package: SQLX,
        name: "Rows",
        embeds: &["*database/sql.Rows"],
        fields: &[],
        methods: &[
            ("MapScan", "error"),
            ("SliceScan", "[]any, error"),
            ("StructScan", "error"),
        ],
    },
    ExternalType {
        package: SQLX,
        name: "Row",
        embeds: &[],
        fields: &[],
        methods: &[
            ("Err", "error"),
            ("MapScan", "error"),
            ("Scan", "error"),
            ("SliceScan", "[]any, error"),
            ("StructScan", "error"),
        ],
    },
    ExternalType {
        package: NET_HTTP,
        name: "Request",
        embeds: &[],
        fields: &[("Method", "string")],
        methods: &[("Context", "context.Context"), ("WithContext", "*Request")],
    },
    ExternalType {
        package: ECHO,
        name: "Context",
        embeds: &[],
        fields: &[],
        methods: &[
            ("Request", "*net/http.Request"),
            ("Param", "string"),
            ("QueryParam", "string"),
            ("Bind", "error"),
            ("JSON", "error"),
            ("String", "error"),
            ("NoContent", "error"),
        ],
    },
];

const BASIC_TYPES: &[&str] = &[
    "any", "bool", "byte", "complex64", "complex128", "error", "float32", "float64", "int",
    "int8", "int16", "int32", "int64", "rune", "string", "uint", "uint8", "uint16", "uint32",
    "uint64", "uintptr",
];

/// Whether `name` is one of Go's predeclared types
pub fn is_basic_type(name: &str) -> bool {
    BASIC_TYPES.contains(&name)
}

/// Parse one entry of the compact notation relative to `package`
fn stub_type(package: &str, spec: &str) -> GoType {
    let spec = spec.trim();
    if let Some(rest) = spec.strip_prefix('*') {
        return GoType::pointer_to(stub_type(package, rest));
    }
    if let Some(rest) = spec.strip_prefix("[]") {
        return GoType::Slice(Box::new(stub_type(package, rest)));
    }
    if is_basic_type(spec) {
        return GoType::Basic(spec.to_string());
    }
    match spec.rsplit_once('.') {
        Some((path, name)) => GoType::named(path, name),
        None => GoType::named(package, spec),
    }
}

fn stub_results(package: &str, spec: &str) -> Vec<GoType> {
    spec.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| stub_type(package, s))
        .collect()
}

fn find_type(named: &NamedType) -> Option<&'static ExternalType> {
    TYPES
        .iter()
        .find(|t| t.package == named.package && t.name == named.name)
}

/// A package-level function or variable of an imported package
pub fn package_member(package: &str, name: &str) -> GoType {
    FUNCS
        .iter()
        .find(|f| f.package == package && f.name == name)
        .map(|f| GoType::Func(Box::new(Signature::returning(stub_results(f.package, f.results)))))
        .unwrap_or(GoType::Unknown)
}

/// Field or method `member` of an external named type, following embedded fields
pub fn type_member(named: &NamedType, member: &str) -> GoType {
    type_member_at_depth(named, member, 0)
}

fn type_member_at_depth(named: &NamedType, member: &str, depth: usize) -> GoType {
    const MAX_EMBED_DEPTH: usize = 4;
    let Some(ext) = find_type(named) else {
        return GoType::Unknown;
    };

    if let Some((_, results)) = ext.methods.iter().find(|(name, _)| *name == member) {
        return GoType::Func(Box::new(Signature::returning(stub_results(
            ext.package,
            results,
        ))));
    }
    if let Some((_, ty)) = ext.fields.iter().find(|(name, _)| *name == member) {
        return stub_type(ext.package, ty);
    }

    for embed in ext.embeds {
        let embedded = stub_type(ext.package, embed);
        let GoType::Named(inner) = embedded.deref() else {
            continue;
        };
        if inner.name == member {
            return embedded;
        }
        if depth < MAX_EMBED_DEPTH {
            let promoted = type_member_at_depth(inner, member, depth + 1);
            if !promoted.is_unknown() {
                return promoted;
            }
        }
    }

    if ext.package == DATABASE_SQL {
        if let Some((_, results)) = SQL_QUERY_METHODS.iter().find(|(name, _)| *name == member) {
            if matches!(ext.name, "DB" | "Tx" | "Conn") {
                return GoType::Func(Box::new(Signature::returning(stub_results(
                    ext.package,
                    results,
                ))));
            }
        }
    }

    GoType::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call_result(ty: GoType) -> GoType {
        match ty {
            GoType::Func(sig) => sig.call_result(),
            other => panic!("expected a function, got {other:?}"),
        }
    }

    #[test]
    fn test_sql_open_returns_db_pointer_and_error() {
        let result = call_result(package_member(DATABASE_SQL, "Open"));
        assert_eq!(
            result,
            GoType::Tuple(vec![
                GoType::pointer_to(GoType::named(DATABASE_SQL, "DB")),
                GoType::Basic("error".into()),
            ])
        );
    }

    #[test]
    fn test_sqlx_db_field_is_sql_db_pointer() {
        let member = type_member(&NamedType::new(SQLX, "DB"), "DB");
        assert_eq!(member, GoType::pointer_to(GoType::named(DATABASE_SQL, "DB")));
    }

    #[test]
    fn test_sqlx_db_promotes_sql_begin() {
        let result = call_result(type_member(&NamedType::new(SQLX, "DB"), "Begin"));
        assert_eq!(
            result,
            GoType::Tuple(vec![
                GoType::pointer_to(GoType::named(DATABASE_SQL, "Tx")),
                GoType::Basic("error".into()),
            ])
        );
    }

    #[test]
    fn test_sqlx_beginx_returns_sqlx_tx() {
        let result = call_result(type_member(&NamedType::new(SQLX, "DB"), "MustBegin"));
        assert_eq!(result, GoType::pointer_to(GoType::named(SQLX, "Tx")));
    }

    #[test]
    fn test_qualified_stub_keeps_dotted_path() {
        assert_eq!(
            stub_type(SQLX, "*github.com/jmoiron/sqlx/reflectx.Mapper"),
            GoType::pointer_to(GoType::named("github.com/jmoiron/sqlx/reflectx", "Mapper"))
        );
    }

    #[test]
    fn test_unknown_members_are_unknown() {
        assert!(package_member("fmt", "Println").is_unknown());
        assert!(type_member(&NamedType::new(DATABASE_SQL, "DB"), "Nope").is_unknown());
    }
}
