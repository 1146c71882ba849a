//! Test setup macros for reducing boilerplate across the test suite.

/// Creates an isolated test database, optionally running setup SQL.
///
/// # Syntax
///
/// ```text
/// test_db!(ctx);
/// test_db!(ctx, setup: "CREATE TABLE t (id INT);");
/// ```
///
/// # Examples
///
/// ```
/// use testsupport::test_db;
///
/// test_db!(ctx, setup: "CREATE TABLE users (id INT, name TEXT);");
/// assert!(ctx.catalog().table("users").is_ok());
/// ```
#[macro_export]
macro_rules! test_db {
    ($ctx:ident) => {
        let mut $ctx = $crate::context::TestContext::new().unwrap();
    };

    ($ctx:ident, setup: $sql:expr) => {
        let mut $ctx = $crate::context::TestContext::with_setup($sql).unwrap();
    };
}

/// Creates a `Tuple` with typed values.
///
/// # Syntax
///
/// ```text
/// row![Value1, Value2, ...]           // Mixed values
/// row![int: 1, 2, 3]                  // All integers
/// row![text: "alice", "bob"]          // All text
/// ```
///
/// # Examples
///
/// ```
/// use testsupport::row;
/// use types::Value;
///
/// let r = row![Value::Int(1), Value::Text("Alice".into())];
/// assert_eq!(r.column_count(), 2);
///
/// let r = row![int: 1, 2, 3];
/// assert_eq!(r.values[2], Value::Int(3));
///
/// let r = row![text: "alice", "bob"];
/// assert_eq!(r.column_count(), 2);
/// ```
#[macro_export]
macro_rules! row {
    // Mixed values
    [$($val:expr),+ $(,)?] => {
        ::common::Tuple::new(vec![$($val),+])
    };

    // All integers
    [int: $($val:expr),+ $(,)?] => {
        ::common::Tuple::new(vec![$(::types::Value::Int($val)),+])
    };

    // All text
    [text: $($val:expr),+ $(,)?] => {
        ::common::Tuple::new(vec![$(::types::Value::Text($val.to_string())),+])
    };
}

#[cfg(test)]
mod tests {
    use types::Value;

    #[test]
    fn test_db_macro_runs_setup() {
        test_db!(ctx, setup: "CREATE TABLE users (id INT, name TEXT);");
        let table = ctx.catalog().table("users").unwrap();
        assert_eq!(table.schema.column_count(), 2);
    }

    #[test]
    fn test_db_macro_without_setup_is_empty() {
        test_db!(ctx);
        assert_eq!(ctx.catalog().tables().count(), 0);
    }

    #[test]
    fn row_macro_variants() {
        let r = row![Value::Int(1), Value::Null];
        assert_eq!(r.values, vec![Value::Int(1), Value::Null]);

        let r = row![int: 1, 2, 3];
        assert_eq!(r.column_count(), 3);

        let r = row![text: "alice", "bob"];
        assert_eq!(r.values[1], Value::Text("bob".into()));
    }
}
