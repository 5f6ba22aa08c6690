use super::*;

fn collect(rows: RawRows) -> Vec<RawRecord> {
    rows.collect::<Result<Vec<_>, _>>().expect("rows decode")
}

#[test]
fn format_from_extension() {
    let cases: &[(&str, Option<InputFormat>)] = &[
        ("people.csv", Some(InputFormat::Csv)),
        ("PEOPLE.CSV", Some(InputFormat::Csv)),
        ("dir/orders.json", Some(InputFormat::Json)),
        ("orders.ndjson", None),
        ("noext", None),
    ];

    for (path, expected) in cases {
        assert_eq!(InputFormat::from_path(Path::new(path)), *expected, "{path}");
    }

    assert_eq!("JSON".parse::<InputFormat>().unwrap(), InputFormat::Json);
    assert!("xml".parse::<InputFormat>().is_err());
}

#[test]
fn csv_rows_keep_header_order_and_text_cells() {
    let input = "id,name,note\n1, Ada ,\n2,Grace,hello\n";
    let rows = collect(csv_rows(input.as_bytes()).unwrap());

    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows[0],
        vec![
            ("id".to_string(), Value::Str("1".into())),
            ("name".to_string(), Value::Str("Ada".into())),
            ("note".to_string(), Value::Null),
        ]
    );
    assert_eq!(rows[1][2].1, Value::Str("hello".into()));
}

#[test]
fn csv_row_with_wrong_cell_count_is_an_error() {
    let input = "a,b\n1,2\n3\n";
    let mut rows = csv_rows(input.as_bytes()).unwrap();

    assert!(rows.next().unwrap().is_ok());
    assert!(matches!(rows.next().unwrap(), Err(SourceError::Csv(_))));
}

#[test]
fn csv_header_only_yields_nothing() {
    let rows = collect(csv_rows("a,b\n".as_bytes()).unwrap());
    assert!(rows.is_empty());
}

#[test]
fn json_rows_decode_scalars_in_key_order() {
    let input = r#"[{"z": 1, "a": 2.5, "m": "x", "b": true, "n": null}]"#;
    let rows = collect(json_rows(input.as_bytes()).unwrap());

    assert_eq!(
        rows,
        vec![vec![
            ("z".to_string(), Value::Int(1)),
            ("a".to_string(), Value::Float(2.5)),
            ("m".to_string(), Value::Str("x".into())),
            ("b".to_string(), Value::Bool(true)),
            ("n".to_string(), Value::Null),
        ]]
    );
}

#[test]
fn json_top_level_must_be_array() {
    let err = json_rows(r#"{"a": 1}"#.as_bytes()).err().expect("should fail");
    assert!(matches!(err, SourceError::NotAnArray("an object")));
}

#[test]
fn json_nested_values_are_malformed_with_index() {
    let input = r#"[{"a": 1}, {"a": 2, "tags": ["x"]}]"#;
    let mut rows = json_rows(input.as_bytes()).unwrap();

    assert!(rows.next().unwrap().is_ok());
    let err = rows.next().unwrap().unwrap_err();
    let malformed = err.as_malformed().expect("malformed record");
    assert_eq!(malformed.sequence_index, 1);
    assert_eq!(malformed.field, "tags");
    assert_eq!(malformed.problem, FieldProblem::NotScalar);
}

#[test]
fn json_non_object_element_is_malformed() {
    let mut rows = json_rows("[1]".as_bytes()).unwrap();
    let err = rows.next().unwrap().unwrap_err();
    assert_eq!(
        err.as_malformed().map(|m| &m.problem),
        Some(&FieldProblem::NotAnObject)
    );
}

#[test]
fn json_integers_beyond_i64_keep_their_text() {
    let input = r#"[{"big": 18446744073709551615, "neg": -5, "ratio": 0.25}]"#;
    let rows = collect(json_rows(input.as_bytes()).unwrap());

    assert_eq!(
        rows,
        vec![vec![
            ("big".to_string(), Value::Str("18446744073709551615".into())),
            ("neg".to_string(), Value::Int(-5)),
            ("ratio".to_string(), Value::Float(0.25)),
        ]]
    );
}
