#![forbid(unsafe_code)]

use std::sync::Arc;

use krpc::{
    Arguments, Context, EndPoint, EndPointBuilder, ErrorKind, OutputJsonStream, Result,
    ServiceBase, services::ServiceInfo,
};

struct Noop;

impl Noop {
    fn call(&self, _: &Context, out: &mut OutputJsonStream) -> Result<()> {
        out.write_value(&true)
    }
}

fn register(builder: &mut EndPointBuilder, service: &str, methods: &[&str]) {
    let mut base = ServiceBase::new(service, Arc::new(Noop));
    for method in methods {
        base.register_method(method, Noop::call);
    }
    base.export(builder);
}

fn list(endpoint: &EndPoint) -> String {
    let mut buf = Vec::new();
    let mut out = OutputJsonStream::new(&mut buf);
    let status = ServiceInfo.list(&Context::new(endpoint), &mut out);
    assert!(status.ok(), "{status}");
    assert!(out.is_complete());
    String::from_utf8(buf).unwrap()
}

#[test]
fn test_list_exact_output() {
    let mut builder = EndPoint::builder();
    register(&mut builder, "A", &["m1", "m2"]);
    register(&mut builder, "B", &["n1"]);
    let endpoint = builder.build();

    assert_eq!(
        list(&endpoint),
        r#"[{"name":"A","methods":["m1","m2"]},{"name":"B","methods":["n1"]}]"#
    );
}

#[test]
fn test_list_empty_registry() {
    assert_eq!(list(&EndPoint::default()), "[]");

    let mut builder = EndPoint::builder();
    register(&mut builder, "Empty", &[]);
    assert_eq!(
        list(&builder.build()),
        r#"[{"name":"Empty","methods":[]}]"#
    );
}

#[test]
fn test_list_is_idempotent() {
    let mut builder = EndPoint::builder();
    register(&mut builder, "Zeta", &["b", "a"]);
    Arc::new(ServiceInfo).export(&mut builder);
    register(&mut builder, "Alpha", &["z", "y", "x"]);
    let endpoint = builder.build();

    let first = list(&endpoint);
    let second = list(&endpoint);
    assert_eq!(first, second);
}

#[test]
fn test_list_matches_registry() {
    let mut builder = EndPoint::builder();
    for i in 0..16 {
        let methods = (0..i).map(|j| format!("Method{j}")).collect::<Vec<_>>();
        let methods = methods.iter().map(String::as_str).collect::<Vec<_>>();
        register(&mut builder, &format!("Service \"{i}\""), &methods);
    }
    Arc::new(ServiceInfo).export(&mut builder);
    let endpoint = builder.build();

    let mut buf = Vec::new();
    let status = endpoint.route(
        ServiceInfo::NAME,
        "List",
        &Arguments::json("{\"ignored\":1}"),
        &mut OutputJsonStream::new(&mut buf),
    );
    assert!(status.ok());

    let decoded: Vec<serde_json::Value> = serde_json::from_slice(&buf).unwrap();
    assert_eq!(decoded.len(), endpoint.services().len());
    for (value, service) in decoded.iter().zip(endpoint.services()) {
        assert_eq!(value["name"], service.name());
        let methods = value["methods"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m.as_str().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(methods, service.method_names().collect::<Vec<_>>());
        assert_eq!(value.as_object().unwrap().len(), 2);
    }
}

#[test]
fn test_route_not_found() {
    let _ = tracing_subscriber::fmt().try_init();
    let mut builder = EndPoint::builder();
    register(&mut builder, "A", &["m1"]);
    Arc::new(ServiceInfo).export(&mut builder);
    let endpoint = builder.build();

    for (service, method) in [("B", "m1"), ("A", "m2"), ("ServiceInfo", "list"), ("", "")] {
        let mut buf = Vec::new();
        let status = endpoint.route(
            service,
            method,
            &Arguments::default(),
            &mut OutputJsonStream::new(&mut buf),
        );
        assert_eq!(status.kind(), Some(&ErrorKind::NotFound), "{service}/{method}");
        assert!(buf.is_empty());
    }
}

#[test]
#[should_panic(expected = "duplicate services: ServiceInfo")]
fn test_service_info_registered_twice() {
    let _ = tracing_subscriber::fmt().try_init();
    let mut builder = EndPoint::builder();
    Arc::new(ServiceInfo).export(&mut builder);
    Arc::new(ServiceInfo).export(&mut builder);
    let _ = builder.build();
}
