//! Import, include and two-pass ordering tests

use pretty_assertions::assert_eq;
use url::Url;
use xsd_compiler::compiler::{Compilation, CompilerOptions, DefinitionKind, Phase, TypeRef};
use xsd_compiler::{Compiler, Error, MemoryLoader, QName, SchemaExport};

fn compile_with(loader: MemoryLoader, root: &str, options: CompilerOptions) -> Compilation {
    Compiler::new(loader)
        .with_options(options)
        .compile(&Url::parse(root).unwrap())
        .expect("root document compiles")
}

fn compile(docs: &[(&str, &str)]) -> Compilation {
    let loader = docs
        .iter()
        .fold(MemoryLoader::new(), |loader, (url, text)| {
            loader.with_document(url, *text)
        });
    compile_with(loader, docs[0].0, CompilerOptions::default())
}

const X: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
        xmlns:y="urn:y" xmlns:z="urn:z" targetNamespace="urn:x">
      <xs:import namespace="urn:y" schemaLocation="y.xsd"/>
      <xs:import namespace="urn:z" schemaLocation="sub/z.xsd"/>
      <xs:element name="Top">
        <xs:complexType>
          <xs:sequence>
            <xs:element ref="z:ZE"/>
            <xs:element name="local" type="y:YT"/>
          </xs:sequence>
        </xs:complexType>
      </xs:element>
    </xs:schema>"#;

const Y: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:y">
      <xs:simpleType name="YT">
        <xs:restriction base="xs:string"/>
      </xs:simpleType>
    </xs:schema>"#;

const Z: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
        xmlns:y="urn:y" targetNamespace="urn:z">
      <xs:import namespace="urn:y" schemaLocation="../y.xsd"/>
      <xs:element name="ZE" type="y:YT"/>
    </xs:schema>"#;

fn xyz() -> Compilation {
    compile(&[
        ("http://schemas.test/x.xsd", X),
        ("http://schemas.test/y.xsd", Y),
        ("http://schemas.test/sub/z.xsd", Z),
    ])
}

#[test]
fn test_first_passes_complete_before_second_pass() {
    let cx = xyz();
    let journal = cx.journal();

    let last_first = journal
        .iter()
        .rposition(|p| matches!(p, Phase::FirstPassDone(_)))
        .unwrap();
    let first_second = journal
        .iter()
        .position(|p| matches!(p, Phase::SecondPassStarted(_)))
        .unwrap();
    assert!(last_first < first_second);

    let second: Vec<_> = journal
        .iter()
        .filter_map(|p| match p {
            Phase::SecondPassStarted(url) => Some(url.path().to_string()),
            _ => None,
        })
        .collect();
    assert_eq!(second, vec!["/y.xsd", "/sub/z.xsd", "/x.xsd"]);
}

#[test]
fn test_shared_import_compiled_once() {
    let cx = xyz();

    assert_eq!(cx.sources().len(), 3);
    assert_eq!(cx.namespace("urn:y").unwrap().sources.len(), 1);
    assert!(cx.errors().is_empty(), "{:?}", cx.errors());
    assert!(cx.document_errors().is_empty());

    let yt = cx
        .global(&QName::namespaced("urn:y", "YT"), DefinitionKind::Type)
        .unwrap();
    let ze = cx
        .global(&QName::namespaced("urn:z", "ZE"), DefinitionKind::Element)
        .unwrap();
    assert_eq!(cx.type_of(ze), Some(&TypeRef::Resolved(yt)));

    let top = cx
        .global(&QName::namespaced("urn:x", "Top"), DefinitionKind::Element)
        .unwrap();
    let anonymous = cx.type_of(top).and_then(TypeRef::node).unwrap();
    let members: Vec<_> = cx
        .members(anonymous, DefinitionKind::Element)
        .into_iter()
        .map(|m| m.name.to_string())
        .collect();
    // References join the body when they resolve, after local declarations
    assert_eq!(members, vec!["{urn:x}local", "{urn:z}ZE"]);
}

#[test]
fn test_cross_namespace_references() {
    let cx = xyz();
    let x = cx.namespace("urn:x").unwrap();
    let y = cx.namespace("urn:y").unwrap().id;
    let z = cx.namespace("urn:z").unwrap().id;
    assert_eq!(x.references.len(), 2);
    assert!(x.references.contains(&y));
    assert!(x.references.contains(&z));
    assert_eq!(cx.namespace("urn:z").unwrap().references, vec![y]);
    assert!(cx.namespace("urn:y").unwrap().references.is_empty());

    let export = SchemaExport::from_compilation(&cx);
    assert_eq!(export.root.as_deref(), Some("urn:x"));
    assert_eq!(export.namespaces.len(), 3);
    assert_eq!(
        export.namespace("urn:z").unwrap().references,
        vec!["urn:y".to_string()]
    );
}

#[test]
fn test_mutual_imports() {
    let cx = compile(&[
        (
            "http://schemas.test/a.xsd",
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
                   xmlns:b="urn:b" targetNamespace="urn:a">
                 <xs:import namespace="urn:b" schemaLocation="b.xsd"/>
                 <xs:complexType name="A">
                   <xs:sequence><xs:element name="b" type="b:B" minOccurs="0"/></xs:sequence>
                 </xs:complexType>
               </xs:schema>"#,
        ),
        (
            "http://schemas.test/b.xsd",
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
                   xmlns:a="urn:a" targetNamespace="urn:b">
                 <xs:import namespace="urn:a" schemaLocation="a.xsd"/>
                 <xs:complexType name="B">
                   <xs:sequence><xs:element name="a" type="a:A" minOccurs="0"/></xs:sequence>
                 </xs:complexType>
               </xs:schema>"#,
        ),
    ]);

    assert_eq!(cx.sources().len(), 2);
    assert!(cx.errors().is_empty(), "{:?}", cx.errors());
}

#[test]
fn test_broken_import_is_recorded() {
    let cx = compile(&[(
        "http://schemas.test/main.xsd",
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
               xmlns:g="urn:gone" targetNamespace="urn:main">
             <xs:import namespace="urn:gone" schemaLocation="gone.xsd"/>
             <xs:element name="uses" type="g:Thing"/>
             <xs:element name="fine" type="xs:string"/>
           </xs:schema>"#,
    )]);

    assert_eq!(cx.document_errors().len(), 1);
    let failed = &cx.document_errors()[0];
    assert_eq!(failed.url.as_str(), "http://schemas.test/gone.xsd");
    assert!(matches!(failed.error, Error::NotFound(_)));

    assert_eq!(cx.errors().len(), 1);
    assert_eq!(cx.errors()[0].name(), &QName::namespaced("urn:gone", "Thing"));
    assert!(cx
        .global(&QName::namespaced("urn:main", "fine"), DefinitionKind::Element)
        .is_some());
}

#[test]
fn test_malformed_import_is_recorded() {
    let cx = compile(&[
        (
            "http://schemas.test/main.xsd",
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:main">
                 <xs:import namespace="urn:bad" schemaLocation="bad.xsd"/>
               </xs:schema>"#,
        ),
        ("http://schemas.test/bad.xsd", "<xs:schema"),
    ]);

    assert_eq!(cx.document_errors().len(), 1);
    assert_eq!(cx.sources().len(), 1);
    assert!(cx
        .journal()
        .iter()
        .all(|p| !matches!(p, Phase::FirstPassDone(url) if url.path() == "/bad.xsd")));
}

#[test]
fn test_redirected_location_is_loaded_once() {
    let loader = MemoryLoader::new()
        .with_document(
            "http://schemas.test/main.xsd",
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:main">
                 <xs:import namespace="urn:a" schemaLocation="short.xsd"/>
                 <xs:import namespace="urn:a" schemaLocation="real.xsd"/>
               </xs:schema>"#,
        )
        .with_document(
            "http://schemas.test/real.xsd",
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:a">
                 <xs:element name="E" type="xs:string"/>
               </xs:schema>"#,
        )
        .alias("http://schemas.test/short.xsd", "http://schemas.test/real.xsd");

    let cx = compile_with(loader, "http://schemas.test/main.xsd", CompilerOptions::default());
    assert_eq!(cx.sources().len(), 2);
    assert!(cx.document_errors().is_empty());

    let namespace = cx.namespace("urn:a").unwrap();
    assert_eq!(namespace.url.as_deref(), Some("http://schemas.test/real.xsd"));
    assert_eq!(cx.globals(namespace.id, DefinitionKind::Element).len(), 1);
}

const MAIN_INCLUDING: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
        xmlns:m="urn:m" targetNamespace="urn:m">
      <xs:include schemaLocation="common.xsd"/>
      <xs:element name="top" type="m:Common"/>
    </xs:schema>"#;

const COMMON: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
      <xs:complexType name="Common">
        <xs:sequence>
          <xs:element name="c" type="Local"/>
        </xs:sequence>
      </xs:complexType>
      <xs:simpleType name="Local">
        <xs:restriction base="xs:string"/>
      </xs:simpleType>
    </xs:schema>"#;

fn chameleon_loader() -> MemoryLoader {
    MemoryLoader::new()
        .with_document("http://schemas.test/main.xsd", MAIN_INCLUDING)
        .with_document("http://schemas.test/common.xsd", COMMON)
}

#[test]
fn test_chameleon_include_adopts_namespace() {
    let cx = compile_with(
        chameleon_loader(),
        "http://schemas.test/main.xsd",
        CompilerOptions::default(),
    );

    assert!(cx.errors().is_empty(), "{:?}", cx.errors());
    let common = cx
        .global(&QName::namespaced("urn:m", "Common"), DefinitionKind::Type)
        .unwrap();
    let local = cx
        .global(&QName::namespaced("urn:m", "Local"), DefinitionKind::Type)
        .unwrap();
    let c = cx.members(common, DefinitionKind::Element)[0].node;
    assert_eq!(cx.type_of(c), Some(&TypeRef::Resolved(local)));
    assert_eq!(cx.namespace("urn:m").unwrap().sources.len(), 2);
}

#[test]
fn test_chameleon_include_disabled() {
    let cx = compile_with(
        chameleon_loader(),
        "http://schemas.test/main.xsd",
        CompilerOptions::new().with_chameleon_includes(false),
    );

    assert_eq!(cx.errors().len(), 1);
    assert_eq!(cx.errors()[0].name(), &QName::namespaced("urn:m", "Common"));
    assert!(cx
        .global(&QName::local("Common"), DefinitionKind::Type)
        .is_some());
}

#[test]
fn test_chameleon_include_compiled_per_namespace() {
    let loader = chameleon_loader().with_document(
        "http://schemas.test/n.xsd",
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
               xmlns:n="urn:n" targetNamespace="urn:n">
             <xs:include schemaLocation="common.xsd"/>
             <xs:element name="other" type="n:Common"/>
           </xs:schema>"#,
    );
    let loader = loader.with_document(
        "http://schemas.test/both.xsd",
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:both">
             <xs:import namespace="urn:m" schemaLocation="main.xsd"/>
             <xs:import namespace="urn:n" schemaLocation="n.xsd"/>
           </xs:schema>"#,
    );
    let cx = compile_with(loader, "http://schemas.test/both.xsd", CompilerOptions::default());

    assert!(cx.errors().is_empty(), "{:?}", cx.errors());
    assert!(cx.document_errors().is_empty());
    assert_eq!(cx.sources().len(), 5);

    for uri in ["urn:m", "urn:n"] {
        let common = cx
            .global(&QName::namespaced(uri, "Common"), DefinitionKind::Type)
            .unwrap();
        let local = cx
            .global(&QName::namespaced(uri, "Local"), DefinitionKind::Type)
            .unwrap();
        let c = cx.members(common, DefinitionKind::Element)[0].node;
        assert_eq!(cx.type_of(c), Some(&TypeRef::Resolved(local)));
        assert_eq!(cx.namespace(uri).unwrap().sources.len(), 2);
    }

    let first_passes = cx
        .journal()
        .iter()
        .filter(|p| matches!(p, Phase::FirstPassDone(url) if url.path() == "/common.xsd"))
        .count();
    assert_eq!(first_passes, 2);
}

#[test]
fn test_chameleon_include_reused_within_namespace() {
    let loader = chameleon_loader().with_document(
        "http://schemas.test/more.xsd",
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:m">
             <xs:include schemaLocation="common.xsd"/>
           </xs:schema>"#,
    );
    let loader = loader.with_document(
        "http://schemas.test/root.xsd",
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:m">
             <xs:include schemaLocation="main.xsd"/>
             <xs:include schemaLocation="more.xsd"/>
           </xs:schema>"#,
    );
    let cx = compile_with(loader, "http://schemas.test/root.xsd", CompilerOptions::default());

    assert!(cx.errors().is_empty(), "{:?}", cx.errors());
    assert_eq!(cx.sources().len(), 4);
    assert_eq!(cx.namespace("urn:m").unwrap().sources.len(), 4);
}

#[test]
fn test_offline_rejects_remote_imports() {
    let loader = MemoryLoader::new()
        .with_document(
            "file:///schemas/main.xsd",
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
                 <xs:import namespace="urn:r" schemaLocation="http://schemas.test/r.xsd"/>
               </xs:schema>"#,
        )
        .with_document(
            "http://schemas.test/r.xsd",
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:r"/>"#,
        );

    let cx = compile_with(
        loader,
        "file:///schemas/main.xsd",
        CompilerOptions::new().with_remote(false),
    );
    assert_eq!(cx.document_errors().len(), 1);
    assert!(matches!(cx.document_errors()[0].error, Error::Resource(_)));
}
