use sitegen::error::Error;
use sitegen::html::{attrs, tag, tag_call, tagf, Attributes, TagArg};

#[test]
fn test_tagf_keeps_attribute_order() {
    let forward = attrs([("a", "1"), ("b", "2"), ("c", "3")]);
    let backward = attrs([("c", "3"), ("b", "2"), ("a", "1")]);

    assert_eq!(tagf("x", &forward), "<x a=\"1\" b=\"2\" c=\"3\">");
    assert_eq!(tagf("x", &backward), "<x c=\"3\" b=\"2\" a=\"1\">");
    assert_eq!(tagf("x", &Attributes::new()), "<x>");
}

#[test]
fn test_tag_ends_with_close_tag_and_newline() {
    for name in ["p", "section", "custom-element"] {
        let html = tag(name, &attrs([("id", "main")]), "body");
        assert!(html.ends_with(&format!("</{name}>\n")));
        assert_eq!(html.matches('\n').count(), 1);
    }
}

#[test]
fn test_any_tag_name_works() {
    assert_eq!(tag_call("blink", &[]).unwrap(), "<blink>");
    assert_eq!(
        tag_call("marquee", &[TagArg::Attrs(Attributes::new()), "hi".into()]).unwrap(),
        "<marquee>hi</marquee>\n"
    );
}

#[test]
fn test_three_or_more_arguments_fail() {
    for extra in 1..4 {
        let mut args: Vec<TagArg> = vec![attrs([("k", "v")]).into(), "content".into()];
        args.extend((0..extra).map(|i| TagArg::Content(i.to_string())));

        match tag_call("div", &args) {
            Err(Error::UnsupportedTagCall { name, count }) => {
                assert_eq!(name, "div");
                assert_eq!(count, 2 + extra);
            }
            other => panic!("Expected UnsupportedTagCall, got {other:?}"),
        }
    }
}
