//
// Copyright (c) The Aftr Project Contributors
//
// SPDX-License-Identifier: MIT
//

use aftr_yang::path::{DataPath, PathError};

#[test]
fn test_parse_plain() {
    let path = DataPath::parse("/softwire-config/binding-table").unwrap();
    assert_eq!(path.len(), 2);
    assert!(path.matches(&["softwire-config", "binding-table"]));
    assert!(!path.matches(&["softwire-config"]));
    assert!(!path.matches(&["softwire-config", "instance"]));
}

#[test]
fn test_parse_queries() {
    let path = DataPath::parse(
        "/br-instances/binding/bind-instance[name=br]/binding-table\
         /binding-entry[binding-ipv6info=2001:db8::1]",
    )
    .unwrap();
    assert_eq!(path.len(), 5);
    assert!(path.has_query(2, None));
    assert!(path.has_query(2, Some(&[("name", "br")])));
    assert!(!path.has_query(2, Some(&[("name", "other")])));
    assert!(!path.has_query(3, None));
    assert_eq!(
        path.query_value(4, "binding-ipv6info"),
        Some("2001:db8::1")
    );
}

#[test]
fn test_parse_multi_key_query() {
    let path =
        DataPath::parse("/softwire-config/binding-table/softwire[ipv4=10.0.0.1][psid=7]")
            .unwrap();
    assert!(path.has_query(2, Some(&[("ipv4", "10.0.0.1"), ("psid", "7")])));
    assert!(!path.has_query(2, Some(&[("ipv4", "10.0.0.1"), ("psid", "8")])));
}

#[test]
fn test_display_round_trip() {
    for input in [
        "/softwire-config/name",
        "/softwire-config/binding-table/softwire[ipv4=10.0.0.1][psid=7]",
        "/br-instances/binding/bind-instance[name=br]",
    ] {
        let path = DataPath::parse(input).unwrap();
        assert_eq!(path.to_string(), input);
        assert_eq!(DataPath::parse(&path.to_string()).unwrap(), path);
    }
}

#[test]
fn test_join() {
    let base = DataPath::parse("/softwire-config").unwrap();
    let rel = DataPath::parse("/binding-table/softwire").unwrap();
    let joined = base.join(&rel);
    assert!(joined.matches(&["softwire-config", "binding-table", "softwire"]));
}

#[test]
fn test_malformed() {
    assert_eq!(DataPath::parse(""), Err(PathError::Empty));
    assert_eq!(
        DataPath::parse("softwire-config"),
        Err(PathError::MissingLeadingSlash)
    );
    assert_eq!(
        DataPath::parse("/softwire-config//name"),
        Err(PathError::EmptyComponent(1))
    );
    assert_eq!(
        DataPath::parse("/a/b[key=value"),
        Err(PathError::UnterminatedQuery(1))
    );
    assert_eq!(
        DataPath::parse("/a/b[keyvalue]"),
        Err(PathError::MissingQueryValue(1))
    );
    assert_eq!(
        DataPath::parse("/a/b[=value]"),
        Err(PathError::EmptyQueryKey(1))
    );
}
