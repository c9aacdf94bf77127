use tracing::debug;

use crate::error::{Result, WfdbError};
use crate::schema::{self, LineKind};
use crate::types::RecordFields;

/// Makes sure every present field of `line_kind` has its dependency present
///
/// Fields are visited from the end of the line backwards, so a placeholder
/// inserted for one dependency is itself checked when the walk reaches it.
/// With `auto_fill` missing dependencies are inserted as
/// [`Value::Empty`](crate::Value::Empty) placeholders; without it the first
/// gap is reported as [`WfdbError::Dependency`].
///
/// # Examples
///
/// ```rust
/// use wfdb_header::{validate_and_complete, LineKind, RecordFields, WfdbError};
///
/// let fields = RecordFields::new().with("units", "mV");
///
/// let completed = validate_and_complete(fields.clone(), LineKind::Signal, true)?;
/// assert!(completed.contains("adcgain"));
/// assert!(completed.contains("fmt"));
/// assert!(completed.contains("filename"));
///
/// match validate_and_complete(fields, LineKind::Signal, false) {
///     Err(WfdbError::Dependency { field, missing_dependency }) => {
///         assert_eq!(field, "units");
///         assert_eq!(missing_dependency, "adcgain");
///     }
///     other => panic!("unexpected: {:?}", other),
/// }
/// # Ok::<(), WfdbError>(())
/// ```
pub fn validate_and_complete(
    mut fields: RecordFields,
    line_kind: LineKind,
    auto_fill: bool,
) -> Result<RecordFields> {
    let schema = schema::schema(line_kind);
    let descriptors = schema.fields();

    for index in (0..descriptors.len()).rev() {
        let field = &descriptors[index];
        if !fields.contains(field.name) {
            continue;
        }
        let Some(dep_index) = schema.dependency_of(index) else {
            continue;
        };
        let dependency = &descriptors[dep_index];
        if fields.contains(dependency.name) {
            continue;
        }

        if !auto_fill {
            return Err(WfdbError::Dependency {
                field: field.name.to_string(),
                missing_dependency: dependency.name.to_string(),
            });
        }

        debug!(
            field = field.name,
            dependency = dependency.name,
            "inserting placeholder for missing dependency"
        );
        fields.insert_placeholder(dependency.name);
    }

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::dependency_chain;
    use crate::types::{FieldValue, Value};

    #[test]
    fn test_auto_fill_closes_whole_chain() {
        let fields = RecordFields::new().with("signame", vec!["ECG", "ABP"]);
        let completed = validate_and_complete(fields, LineKind::Signal, true).unwrap();

        for name in dependency_chain("signame").unwrap() {
            assert_eq!(
                completed.get(name),
                Some(&FieldValue::Scalar(Value::Empty)),
                "{} should be a placeholder",
                name
            );
        }
        // untouched branches stay absent
        assert!(!completed.contains("units"));
        assert!(!completed.contains("skew"));
    }

    #[test]
    fn test_present_dependencies_are_kept() {
        let fields = RecordFields::new()
            .with("filename", vec!["a.dat"])
            .with("fmt", vec![16])
            .with("adcgain", vec![100.0])
            .with("units", vec!["uV"]);
        let completed = validate_and_complete(fields.clone(), LineKind::Signal, false).unwrap();
        assert_eq!(completed, fields);
    }

    #[test]
    fn test_reports_nearest_missing_dependency() {
        let fields = RecordFields::new()
            .with("recordname", "r")
            .with("nsig", 1)
            .with("basedate", "01/01/2000");
        match validate_and_complete(fields, LineKind::Record, false) {
            Err(WfdbError::Dependency {
                field,
                missing_dependency,
            }) => {
                assert_eq!(field, "basedate");
                assert_eq!(missing_dependency, "basetime");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_other_line_kinds_are_ignored() {
        let fields = RecordFields::new().with("units", vec!["mV"]);
        let completed = validate_and_complete(fields.clone(), LineKind::Record, false).unwrap();
        assert_eq!(completed, fields);
    }
}
