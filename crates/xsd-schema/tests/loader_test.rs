//! Integration tests for the two-phase loader

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use xsd_schema::{
    Context, Declaration, EntryKind, Error, FetchOptions, FetchedDocument, Fetcher, FileFetcher,
    LoadState, Loader, MemoryFetcher, NodeData, NodeId, Occurs, QName, XML_NS, XSD_NS,
};

const BASE: &str = "http://example.com/schemas/";

/// Helper to serve every fixture under `BASE`
fn fixtures() -> Arc<MemoryFetcher> {
    let fetcher = MemoryFetcher::new();
    for (name, text) in [
        ("person.xsd", include_str!("data/person.xsd")),
        ("cycle_a.xsd", include_str!("data/cycle_a.xsd")),
        ("cycle_b.xsd", include_str!("data/cycle_b.xsd")),
        ("main.xsd", include_str!("data/main.xsd")),
        ("left.xsd", include_str!("data/left.xsd")),
        ("right.xsd", include_str!("data/right.xsd")),
        ("common.xsd", include_str!("data/common.xsd")),
        ("includer.xsd", include_str!("data/includer.xsd")),
        ("chameleon.xsd", include_str!("data/chameleon.xsd")),
    ] {
        fetcher.insert(format!("{BASE}{name}"), text);
    }
    Arc::new(fetcher)
}

fn url(name: &str) -> String {
    format!("{BASE}{name}")
}

/// Helper to find a global declaration
fn global(ctx: &Context, ns: &str, kind: EntryKind, local: &str) -> NodeId {
    let id = ctx.namespace_id(ns).unwrap();
    let root = ctx.namespace(id).root_scope;
    ctx.lookup(root, kind, &QName::new(Some(ns), local))
        .unwrap_or_else(|| panic!("{local} not declared in {ns}"))
        .node
}

/// Helper to find a declaration in the scope a node opened
fn local(ctx: &Context, owner: NodeId, kind: EntryKind, name: &QName) -> Declaration {
    let scope = ctx.node(owner).own_scope.unwrap();
    ctx.scope(scope).get(kind, name).unwrap().clone()
}

/// Serves from memory, holding back one URL for a while
struct SlowFetcher {
    inner: MemoryFetcher,
    slow: String,
}

#[async_trait]
impl Fetcher for SlowFetcher {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> xsd_schema::Result<FetchedDocument> {
        if url == self.slow {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        self.inner.fetch(url, options).await
    }
}

fn element_type(ctx: &Context, element: NodeId) -> Option<NodeId> {
    match &ctx.node(element).data {
        NodeData::Element(data) => data.type_node,
        _ => None,
    }
}

#[tokio::test]
async fn test_person_members_and_types() {
    let fetcher = fixtures();
    let mut ctx = Context::new();
    let ns = Loader::new(&mut ctx, fetcher.clone())
        .import(&url("person.xsd"))
        .await
        .unwrap();

    let tns = "http://example.com/person";
    assert_eq!(ctx.namespace(ns).uri, tns);
    assert_eq!(ctx.namespace(ns).load_state, LoadState::Loaded);

    let person = global(&ctx, tns, EntryKind::Type, "Person");
    assert_eq!(ctx.node(person).comment.as_deref(), Some("A natural person."));

    // elementFormDefault="qualified"
    let name = local(&ctx, person, EntryKind::Element, &QName::new(Some(tns), "name"));
    assert_eq!((name.min, name.max), (1, Occurs::Bounded(1)));
    assert_eq!(element_type(&ctx, name.node), ctx.builtin("string"));

    let age = local(&ctx, person, EntryKind::Element, &QName::new(Some(tns), "age"));
    assert_eq!(age.min, 0);
    assert_eq!(element_type(&ctx, age.node), ctx.builtin("int"));

    let nickname = local(&ctx, person, EntryKind::Element, &QName::new(Some(tns), "nickname"));
    assert_eq!(nickname.max, Occurs::Unbounded);

    let color = global(&ctx, tns, EntryKind::Type, "Color");
    let favourite = local(&ctx, person, EntryKind::Element, &QName::new(Some(tns), "favourite"));
    assert_eq!(element_type(&ctx, favourite.node), Some(color));

    // attributes stay unqualified
    let id = local(&ctx, person, EntryKind::Attribute, &QName::new(None, "id"));
    assert_eq!(id.min, 1);
}

#[tokio::test]
async fn test_two_file_cycle_resolves_forward_references() {
    let fetcher = fixtures();
    let mut ctx = Context::new();
    Loader::new(&mut ctx, fetcher.clone())
        .import(&url("cycle_a.xsd"))
        .await
        .unwrap();

    let order = global(&ctx, "urn:cycle:a", EntryKind::Type, "Order");
    let order_ref = global(&ctx, "urn:cycle:a", EntryKind::Type, "OrderRef");
    let customer = global(&ctx, "urn:cycle:b", EntryKind::Type, "Customer");

    let field = local(&ctx, order, EntryKind::Element, &QName::new(None, "customer"));
    assert_eq!(element_type(&ctx, field.node), Some(customer));

    let back = local(&ctx, customer, EntryKind::Element, &QName::new(None, "lastOrder"));
    assert_eq!(element_type(&ctx, back.node), Some(order_ref));

    assert_eq!(fetcher.fetch_count(&url("cycle_a.xsd")), 1);
    assert_eq!(fetcher.fetch_count(&url("cycle_b.xsd")), 1);
}

#[tokio::test]
async fn test_diamond_import_fetches_once() {
    let fetcher = fixtures();
    let mut ctx = Context::new();
    Loader::new(&mut ctx, fetcher.clone())
        .import(&url("main.xsd"))
        .await
        .unwrap();

    assert_eq!(fetcher.fetch_count(&url("common.xsd")), 1);

    let common = ctx.namespace_id("urn:common").unwrap();
    assert_eq!(ctx.namespace(common).documents.len(), 1);
    assert_eq!(
        ctx.namespaces().iter().filter(|ns| ns.uri == "urn:common").count(),
        1
    );

    let code = global(&ctx, "urn:common", EntryKind::Type, "Code");
    let left = global(&ctx, "urn:left", EntryKind::Type, "Left");
    let right = global(&ctx, "urn:right", EntryKind::Type, "Right");
    let field = QName::new(None, "code");
    assert_eq!(element_type(&ctx, local(&ctx, left, EntryKind::Element, &field).node), Some(code));
    assert_eq!(element_type(&ctx, local(&ctx, right, EntryKind::Element, &field).node), Some(code));
}

#[tokio::test]
async fn test_chameleon_include_groups_and_choice() {
    let fetcher = fixtures();
    let mut ctx = Context::new();
    let ns = Loader::new(&mut ctx, fetcher.clone())
        .import(&url("includer.xsd"))
        .await
        .unwrap();
    assert_eq!(ctx.namespace(ns).documents.len(), 2);

    // chameleon declarations land in the includer's namespace
    let label = global(&ctx, "urn:tagging", EntryKind::Type, "Label");
    let tagged = global(&ctx, "urn:tagging", EntryKind::Type, "Tagged");
    let field = local(&ctx, tagged, EntryKind::Element, &QName::new(None, "label"));
    assert_eq!(element_type(&ctx, field.node), Some(label));

    let note = global(&ctx, "urn:tagging", EntryKind::Type, "Note");
    let scope = ctx.node(note).own_scope.unwrap();
    let members = ctx.scope(scope).members();

    let group_ref = members
        .iter()
        .find(|d| d.kind == EntryKind::GroupRef)
        .unwrap();
    assert_eq!((group_ref.min, group_ref.max), (1, Occurs::Bounded(2)));
    let header = global(&ctx, "urn:tagging", EntryKind::Group, "Header");
    assert!(matches!(
        ctx.node(group_ref.node).data,
        NodeData::Group { target: Some(target), .. } if target == header
    ));

    // choice branches are optional
    let text = local(&ctx, note, EntryKind::Element, &QName::new(None, "text"));
    let html = local(&ctx, note, EntryKind::Element, &QName::new(None, "html"));
    assert_eq!((text.min, html.min), (0, 0));

    let tag = local(&ctx, header, EntryKind::Element, &QName::new(None, "tag"));
    assert_eq!((tag.min, tag.max), (0, Occurs::Unbounded));

    let audit = global(&ctx, "urn:tagging", EntryKind::AttributeGroup, "Audit");
    let lang = local(&ctx, audit, EntryKind::Attribute, &QName::new(Some(XML_NS), "lang"));
    assert!(matches!(
        &ctx.node(lang.node).data,
        NodeData::Attribute(data) if data.target.is_some()
    ));
}

#[tokio::test]
async fn test_missing_import_is_fatal() {
    let fetcher = Arc::new(MemoryFetcher::new().with(
        url("broken.xsd"),
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:broken">
  <xs:import namespace="urn:gone" schemaLocation="gone.xsd"/>
</xs:schema>"#,
    ));

    let mut ctx = Context::new();
    let err = Loader::new(&mut ctx, fetcher)
        .import(&url("broken.xsd"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("broken.xsd:2:"));
    match err {
        Error::Fetch {
            url: failed,
            origin,
            ..
        } => {
            assert_eq!(failed, url("gone.xsd"));
            let origin = origin.expect("fetch error names the import");
            assert_eq!(origin.source, url("broken.xsd"));
            assert_eq!(origin.position.line, 2);
            assert_eq!(origin.context.as_deref(), Some("import"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_documents_are_parsed_in_request_order() {
    const SPLIT: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:split">
  <xs:include schemaLocation="first.xsd"/>
  <xs:include schemaLocation="second.xsd"/>
</xs:schema>"#;
    const FIRST: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:split">
  <xs:simpleType name="Alpha"><xs:restriction base="xs:string"/></xs:simpleType>
</xs:schema>"#;
    const SECOND: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:split">
  <xs:simpleType name="Beta"><xs:restriction base="xs:string"/></xs:simpleType>
</xs:schema>"#;

    for slow in ["first.xsd", "second.xsd"] {
        let fetcher = SlowFetcher {
            inner: MemoryFetcher::new()
                .with(url("split.xsd"), SPLIT)
                .with(url("first.xsd"), FIRST)
                .with(url("second.xsd"), SECOND),
            slow: url(slow),
        };

        let mut ctx = Context::new();
        let ns = Loader::new(&mut ctx, Arc::new(fetcher))
            .import(&url("split.xsd"))
            .await
            .unwrap();

        let names: Vec<&str> = ctx
            .globals(ns)
            .iter()
            .filter_map(|d| d.name.as_ref().map(QName::local))
            .collect();
        assert_eq!(names, ["Alpha", "Beta"], "slow document: {slow}");
    }
}

#[tokio::test]
async fn test_redefine_replaces_included_type() {
    let fetcher = Arc::new(
        MemoryFetcher::new()
            .with(
                url("address.xsd"),
                r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:r="urn:r" targetNamespace="urn:r">
  <xs:redefine schemaLocation="address_base.xsd">
    <xs:complexType name="Address">
      <xs:complexContent>
        <xs:extension base="r:Address">
          <xs:sequence><xs:element name="zip" type="xs:string"/></xs:sequence>
        </xs:extension>
      </xs:complexContent>
    </xs:complexType>
  </xs:redefine>
  <xs:element name="address" type="r:Address"/>
</xs:schema>"#,
            )
            .with(
                url("address_base.xsd"),
                r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:r">
  <xs:complexType name="Address">
    <xs:sequence><xs:element name="street" type="xs:string"/></xs:sequence>
  </xs:complexType>
  <xs:simpleType name="Country"><xs:restriction base="xs:string"/></xs:simpleType>
</xs:schema>"#,
            ),
    );

    let mut ctx = Context::new();
    let ns = Loader::new(&mut ctx, fetcher.clone())
        .import(&url("address.xsd"))
        .await
        .unwrap();
    assert_eq!(ctx.namespace(ns).documents.len(), 2);

    let address = global(&ctx, "urn:r", EntryKind::Type, "Address");
    assert_eq!(ctx.location(address).source, url("address.xsd"));
    let zip = local(&ctx, address, EntryKind::Element, &QName::new(None, "zip"));
    assert_eq!(element_type(&ctx, zip.node), ctx.builtin("string"));

    let element = global(&ctx, "urn:r", EntryKind::Element, "address");
    assert_eq!(element_type(&ctx, element), Some(address));

    // the redefined document still contributes its other globals
    global(&ctx, "urn:r", EntryKind::Type, "Country");
    let addresses = ctx
        .globals(ns)
        .iter()
        .filter(|d| d.name.as_ref().is_some_and(|n| n.local() == "Address"))
        .count();
    assert_eq!(addresses, 1);
    assert_eq!(fetcher.fetch_count(&url("address_base.xsd")), 1);
}

#[tokio::test]
async fn test_failed_import_of_loaded_namespace_is_ignored() {
    let fetcher = Arc::new(
        MemoryFetcher::new()
            .with(
                url("consumer.xsd"),
                r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:s="urn:shared" targetNamespace="urn:consumer">
  <xs:import schemaLocation="shared.xsd"/>
  <xs:import namespace="urn:shared" schemaLocation="http://mirror.example.com/shared.xsd"/>
  <xs:element name="code" type="s:Code"/>
</xs:schema>"#,
            )
            .with(
                url("shared.xsd"),
                r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:shared">
  <xs:simpleType name="Code"><xs:restriction base="xs:string"/></xs:simpleType>
</xs:schema>"#,
            ),
    );

    let mut ctx = Context::new();
    Loader::new(&mut ctx, fetcher.clone())
        .import(&url("consumer.xsd"))
        .await
        .unwrap();

    assert_eq!(fetcher.fetch_count("http://mirror.example.com/shared.xsd"), 1);
    let shared = ctx.namespace_id("urn:shared").unwrap();
    assert_eq!(ctx.namespace(shared).documents.len(), 1);
    assert_eq!(ctx.namespace(shared).load_state, LoadState::Loaded);

    let code = global(&ctx, "urn:shared", EntryKind::Type, "Code");
    let element = global(&ctx, "urn:consumer", EntryKind::Element, "code");
    assert_eq!(element_type(&ctx, element), Some(code));
}

#[tokio::test]
async fn test_unresolved_reference_reports_position() {
    let fetcher = Arc::new(MemoryFetcher::new().with(
        url("dangling.xsd"),
        "<xs:schema xmlns:xs=\"http://www.w3.org/2001/XMLSchema\" xmlns:t=\"urn:t\" targetNamespace=\"urn:t\">\n\
         <xs:element name=\"thing\" type=\"t:Missing\"/>\n\
         </xs:schema>",
    ));

    let mut ctx = Context::new();
    let err = Loader::new(&mut ctx, fetcher)
        .import(&url("dangling.xsd"))
        .await
        .unwrap_err();

    match err {
        Error::UnresolvedReference { name, location, .. } => {
            assert_eq!(name, "{urn:t}Missing");
            assert_eq!(location.position.line, 2);
            assert_eq!(location.source, url("dangling.xsd"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_duplicate_global_type_is_rejected() {
    let fetcher = Arc::new(MemoryFetcher::new().with(
        url("twice.xsd"),
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:t">
  <xs:simpleType name="Code"><xs:restriction base="xs:string"/></xs:simpleType>
  <xs:simpleType name="Code"><xs:restriction base="xs:int"/></xs:simpleType>
</xs:schema>"#,
    ));

    let mut ctx = Context::new();
    let err = Loader::new(&mut ctx, fetcher)
        .import(&url("twice.xsd"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateDeclaration { .. }));
}

#[tokio::test]
async fn test_default_namespace_for_entry_without_target() {
    let fetcher = Arc::new(MemoryFetcher::new().with(
        url("plain.xsd"),
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:simpleType name="Code"><xs:restriction base="xs:string"/></xs:simpleType>
  <xs:element name="code" type="Code"/>
</xs:schema>"#,
    ));

    let mut ctx = Context::new();
    let ns = Loader::new(&mut ctx, fetcher)
        .with_default_namespace(Some("urn:default".to_string()))
        .import(&url("plain.xsd"))
        .await
        .unwrap();

    assert_eq!(ctx.namespace(ns).uri, "urn:default");
    let code = global(&ctx, "urn:default", EntryKind::Type, "Code");
    let element = global(&ctx, "urn:default", EntryKind::Element, "code");
    assert_eq!(element_type(&ctx, element), Some(code));
}

#[tokio::test]
async fn test_repeated_import_is_noop() {
    let fetcher = fixtures();
    let mut ctx = Context::new();
    let mut loader = Loader::new(&mut ctx, fetcher.clone());

    let first = loader.import(&url("person.xsd")).await.unwrap();
    let nodes = loader.context().node_count();
    let second = loader.import(&url("person.xsd")).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(loader.context().node_count(), nodes);
    assert_eq!(fetcher.fetch_count(&url("person.xsd")), 1);
}

#[tokio::test]
async fn test_local_files_with_relative_includes() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::create_dir(dir.path().join("parts"))?;
    std::fs::write(
        dir.path().join("root.xsd"),
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:r="urn:root" targetNamespace="urn:root">
  <xs:include schemaLocation="parts/types.xsd"/>
  <xs:element name="amount" type="r:Amount"/>
</xs:schema>"#,
    )?;
    std::fs::write(
        dir.path().join("parts/types.xsd"),
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:root">
  <xs:simpleType name="Amount"><xs:restriction base="xs:decimal"/></xs:simpleType>
</xs:schema>"#,
    )?;

    let entry = dir.path().join("root.xsd").to_string_lossy().into_owned();
    let mut ctx = Context::new();
    Loader::new(&mut ctx, Arc::new(FileFetcher)).import(&entry).await?;

    let amount = global(&ctx, "urn:root", EntryKind::Type, "Amount");
    let element = global(&ctx, "urn:root", EntryKind::Element, "amount");
    assert_eq!(element_type(&ctx, element), Some(amount));
    assert!(ctx.lookup(
        ctx.namespace(ctx.primitive()).root_scope,
        EntryKind::Type,
        &QName::new(Some(XSD_NS), "decimal")
    )
    .is_some());
    Ok(())
}
