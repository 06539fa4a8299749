use formatter::{Color, Unit, Value};
use serde_json::Value as Json;

/// Build a [`Value`] from the JSON notation used by the fixture files.
pub fn value_from_json(json: &Json) -> Value {
    let Json::Object(map) = json else {
        assert!(json.is_null(), "unsupported fixture value {json}");
        return Value::Null;
    };
    assert_eq!(map.len(), 1, "fixture value must have exactly one tag: {json}");
    let (tag, body) = map.iter().next().expect("one entry");
    match tag.as_str() {
        "int" => Value::Int(body.as_i64().expect("int") as i32),
        "int16" => Value::Int16(body.as_i64().expect("int16") as i16),
        "int64" => Value::Int64(body.as_i64().expect("int64")),
        "bool" => Value::Bool(body.as_bool().expect("bool")),
        "str" => Value::from(body.as_str().expect("str")),
        "unit" => Value::Unit(Unit::parse(body.as_str().expect("unit")).expect("unit text")),
        "color" => Value::Color(Color::parse(body.as_str().expect("color")).expect("color text")),
        "strings" => Value::StringArray(
            items(body)
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect(),
        ),
        "array" => Value::Array(items(body).iter().map(value_from_json).collect()),
        "list" => Value::List(items(body).iter().map(value_from_json).collect()),
        "pair" => {
            let parts = items(body);
            assert_eq!(parts.len(), 2, "pair needs two items");
            Value::pair(value_from_json(&parts[0]), value_from_json(&parts[1]))
        }
        "triplet" => {
            let parts = items(body);
            assert_eq!(parts.len(), 3, "triplet needs three items");
            Value::triplet(
                value_from_json(&parts[0]),
                value_from_json(&parts[1]),
                value_from_json(&parts[2]),
            )
        }
        "map" => Value::Map(
            items(body)
                .iter()
                .map(|entry| {
                    let kv = items(entry);
                    assert_eq!(kv.len(), 2, "map entry needs key and value");
                    (value_from_json(&kv[0]), value_from_json(&kv[1]))
                })
                .collect(),
        ),
        other => panic!("unknown fixture tag '{other}'"),
    }
}

fn items(json: &Json) -> &Vec<Json> {
    json.as_array()
        .unwrap_or_else(|| panic!("expected array, found {json}"))
}
