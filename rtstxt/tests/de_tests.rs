use rtstxt::{DefaultRtsTxt, RtsTxt, from_node, from_str, to_string};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use tempfile::NamedTempFile;

fn deserialize_from_file<T: DeserializeOwned>(data: &str) -> T {
    let mut file = NamedTempFile::new().expect("TempFile");
    write!(file, "{}", data).expect("Write");
    let tokens = DefaultRtsTxt::open_txt(file.path()).expect("Tokenize");
    let ast = DefaultRtsTxt::parse(tokens).expect("Parse");
    from_node(&ast).expect("Deserialize")
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
struct Simple {
    foo: i32,
    bar: String,
}

#[test]
fn test_simple_struct() {
    let data = r#"
        foo = 123
        bar = "hello"
    "#;
    let s: Simple = deserialize_from_file(data);
    assert_eq!(
        s,
        Simple {
            foo: 123,
            bar: "hello".to_string()
        }
    );
}

#[derive(Debug, Deserialize, PartialEq)]
struct BoolTest {
    is_true: bool,
    is_false: bool,
}

#[test]
fn test_bools() {
    let s: BoolTest = from_str("is_true = yes is_false = no").expect("bools");
    assert!(s.is_true);
    assert!(!s.is_false);
}

#[derive(Debug, Deserialize, PartialEq)]
struct ListTest {
    nums: Vec<u8>,
    names: Vec<String>,
    ratio: f64,
}

#[test]
fn test_lists_and_coercion() {
    let data = r#"
        nums = { 1 2 3 }
        names = { "a" "b" c }
        ratio = 2
    "#;
    let s: ListTest = from_str(data).expect("lists");
    assert_eq!(s.nums, vec![1, 2, 3]);
    assert_eq!(s.names, vec!["a", "b", "c"]);
    assert_eq!(s.ratio, 2.0);
}

#[test]
fn test_out_of_range_int_is_an_error() {
    let r: Result<ListTest, _> = from_str("nums = { 300 } names = { } ratio = 1");
    assert!(r.is_err());
}

#[derive(Debug, Deserialize, PartialEq)]
struct Nested {
    inner: Simple,
    missing: Option<u32>,
}

#[test]
fn test_nested_and_missing_option() {
    let data = r#"
        inner = {
            foo = 999
            bar = "inner"
        }
    "#;
    let s: Nested = from_str(data).expect("nested");
    assert_eq!(s.inner.foo, 999);
    assert_eq!(s.missing, None);
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
enum Step {
    Wait,
    Sleep(u32),
    Need(String),
    Force { id: u8, units: Vec<(String, u32)> },
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
struct Script {
    steps: Vec<Step>,
}

#[test]
fn test_enums_in_anonymous_blocks() {
    let data = r#"
        steps = {
            wait
            { sleep = 30 }
            { need = town-hall }
            { force = { id = 1 units = { { footman 4 } { archer 2 } } } }
        }
    "#;
    let s: Script = from_str(data).expect("script");
    assert_eq!(
        s.steps,
        vec![
            Step::Wait,
            Step::Sleep(30),
            Step::Need("town-hall".to_string()),
            Step::Force {
                id: 1,
                units: vec![("footman".to_string(), 4), ("archer".to_string(), 2)],
            },
        ]
    );
}

#[test]
fn test_enum_block_with_two_keys_is_rejected() {
    let r: Result<Script, _> = from_str("steps = { { sleep = 1 wait = 2 } }");
    assert!(r.is_err());
}

#[derive(Debug, Deserialize, Serialize, PartialEq)]
struct Gold(u32);

#[derive(Debug, Deserialize, Serialize, PartialEq)]
struct Bank {
    gold: Gold,
    by_player: BTreeMap<u8, Gold>,
}

#[test]
fn test_newtypes_and_int_keys() {
    let s: Bank = from_str("gold = 5 by_player = { 0 = 10 3 = 40 }").expect("bank");
    assert_eq!(s.gold, Gold(5));
    assert_eq!(s.by_player.get(&3), Some(&Gold(40)));
}

#[test]
fn test_written_text_reads_back() {
    let script = Script {
        steps: vec![
            Step::Wait,
            Step::Sleep(5),
            Step::Force {
                id: 2,
                units: vec![("knight".to_string(), 3)],
            },
        ],
    };
    let text = to_string(&script).expect("write");
    let back: Script = from_str(&text).expect("read");
    assert_eq!(back, script);
}
