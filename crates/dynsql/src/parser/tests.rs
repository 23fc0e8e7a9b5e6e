use super::*;
use crate::error::Location;

fn parse(src: &str) -> Arc<ParsedTemplate> {
    parse_template("t", src).unwrap()
}

fn syntax_error(src: &str) -> DynSqlError {
    let err = parse_template("t", src).unwrap_err();
    assert!(err.is_syntax(), "expected syntax error for {src:?}, got {err}");
    err
}

#[test]
fn plain_text_with_placeholders() {
    let tpl = parse("SELECT * FROM blog WHERE id = #{id} AND state = #{ state }");
    let [Node::Text(segments)] = tpl.nodes() else {
        panic!("expected one text node: {:?}", tpl.nodes());
    };
    assert_eq!(segments.len(), 4);
    assert_eq!(segments[0], Segment::Literal("SELECT * FROM blog WHERE id = ".into()));
    assert_eq!(segments[1], Segment::Placeholder(Expr::Var("id".into())));
    assert_eq!(segments[3], Segment::Placeholder(Expr::Var("state".into())));
}

#[test]
fn placeholder_options_are_ignored() {
    let tpl = parse("#{author.id, jdbcType=INTEGER}");
    let [Node::Text(segments)] = tpl.nodes() else {
        panic!("expected text");
    };
    assert_eq!(
        segments[0],
        Segment::Placeholder(Expr::Field(Box::new(Expr::Var("author".into())), "id".into()))
    );
}

#[test]
fn nested_directives() {
    let tpl = parse(
        r#"SELECT * FROM blog
<where>
  <if test="state != null">state = #{state}</if>
  <choose>
    <when test="title != null">AND title like #{title}</when>
    <otherwise>AND featured = 1</otherwise>
  </choose>
</where>"#,
    );
    assert_eq!(tpl.nodes().len(), 2);
    let Node::Where(children) = &tpl.nodes()[1] else {
        panic!("expected where");
    };
    assert!(children.iter().any(|n| matches!(n, Node::If { .. })));
    let choose = children
        .iter()
        .find(|n| matches!(n, Node::Choose { .. }))
        .unwrap();
    let Node::Choose { whens, otherwise } = choose else {
        unreachable!()
    };
    assert_eq!(whens.len(), 1);
    assert!(otherwise.is_some());
}

#[test]
fn foreach_attributes_and_defaults() {
    let tpl = parse(r#"<foreach collection="ids" open="(" close=")" separator=",">#{item}</foreach>"#);
    let Node::Foreach {
        item,
        index,
        open,
        close,
        separator,
        nullable,
        ..
    } = &tpl.nodes()[0]
    else {
        panic!("expected foreach");
    };
    assert_eq!(item, "item");
    assert_eq!(index, &None);
    assert_eq!((open.as_str(), close.as_str(), separator.as_str()), ("(", ")", ","));
    assert!(!*nullable);

    let tpl = parse(r#"<foreach collection="rows" item="r" index="i" nullable="true">#{r}</foreach>"#);
    let Node::Foreach { index, nullable, .. } = &tpl.nodes()[0] else {
        panic!("expected foreach");
    };
    assert_eq!(index.as_deref(), Some("i"));
    assert!(*nullable);
}

#[test]
fn trim_overrides_split_on_pipe() {
    let tpl = parse(r#"<trim prefix="WHERE" prefixOverrides="AND |OR ">x</trim>"#);
    let Node::Trim {
        prefix,
        prefix_overrides,
        suffix_overrides,
        ..
    } = &tpl.nodes()[0]
    else {
        panic!("expected trim");
    };
    assert_eq!(prefix, "WHERE");
    assert_eq!(prefix_overrides, &vec!["AND ".to_string(), "OR ".to_string()]);
    assert!(suffix_overrides.is_empty());
}

#[test]
fn self_closing_bind_scopes_over_rest_of_block() {
    let tpl = parse(
        r#"<if test="title != null"><bind name="pattern" value="'%' + title + '%'"/>title LIKE #{pattern}</if> tail"#,
    );
    let Node::If { children, .. } = &tpl.nodes()[0] else {
        panic!("expected if");
    };
    let [Node::Bind { name, children, .. }] = children.as_slice() else {
        panic!("bind should wrap the rest of the if body: {children:?}");
    };
    assert_eq!(name, "pattern");
    assert!(matches!(children.as_slice(), [Node::Text(_)]));
    // Text after the </if> is outside the bind.
    assert!(matches!(&tpl.nodes()[1], Node::Text(_)));
}

#[test]
fn include_with_properties() {
    let tpl = parse(r#"<include refid="userColumns"><property name="alias" value="u"/></include>"#);
    assert_eq!(
        tpl.nodes()[0],
        Node::Include {
            refid: "userColumns".into(),
            properties: vec![("alias".into(), "u".into())],
        }
    );
    assert_eq!(tpl.include_refs(), vec!["userColumns"]);
}

#[test]
fn property_references_in_text() {
    let tpl = parse("SELECT ${alias}.id FROM users ${alias}");
    let [Node::Text(segments)] = tpl.nodes() else {
        panic!("expected text");
    };
    assert_eq!(segments[1], Segment::Property("alias".into()));
    assert_eq!(segments.len(), 4);
}

#[test]
fn entities_cdata_and_comments() {
    let tpl = parse("a &lt; #{n}<!-- note --><![CDATA[ AND b <= #{m}]]>");
    let [Node::Text(segments)] = tpl.nodes() else {
        panic!("expected a single merged text node: {:?}", tpl.nodes());
    };
    assert_eq!(segments[0], Segment::Literal("a < ".into()));
    assert_eq!(segments[2], Segment::Literal(" AND b <= ".into()));
    assert_eq!(segments[3], Segment::Placeholder(Expr::Var("m".into())));
}

#[test]
fn less_than_in_text_is_literal() {
    let tpl = parse("WHERE a < 3 AND b <= 4");
    assert_eq!(
        tpl.nodes(),
        &[Node::Text(vec![Segment::Literal("WHERE a < 3 AND b <= 4".into())])]
    );
}

#[test]
fn unclosed_directive_reports_opening_tag() {
    let err = syntax_error("SELECT *\n  <if test=\"a\">x");
    assert_eq!(err.location(), Some(Location::new(2, 3)));
    assert!(err.to_string().contains("unclosed <if>"));
}

#[test]
fn structural_errors() {
    syntax_error("<if test=\"a\">x</where>");
    syntax_error("</if>");
    syntax_error("<frobnicate>x</frobnicate>");
    syntax_error("<if>x</if>");
    syntax_error("<if test=\"a\" tset=\"b\">x</if>");
    syntax_error("<when test=\"a\">x</when>");
    syntax_error("<otherwise>x</otherwise>");
    syntax_error("<property name=\"a\" value=\"b\"/>");
    syntax_error("<choose>text</choose>");
    syntax_error("<choose><otherwise>a</otherwise><when test=\"b\">c</when></choose>");
    syntax_error("<include refid=\"a\"><if test=\"b\">c</if></include>");
    syntax_error("<include refid=\"${name}\"/>");
    syntax_error("<foreach item=\"x\">#{x}</foreach>");
    syntax_error("<foreach collection=\"a\" nullable=\"yes\"/>");
    syntax_error("<bind name=\"a b\" value=\"1\"/>");
    syntax_error("id = #{id");
    syntax_error("${}");
}

#[test]
fn expression_errors_carry_template_location() {
    let err = parse_template("t", "x\n<if test=\"a ==\">y</if>").unwrap_err();
    assert!(err.is_expression(), "{err}");
    assert_eq!(err.location().map(|l| l.line), Some(2));

    let err = parse_template("t", "id = #{ , jdbcType=INTEGER}").unwrap_err();
    assert!(err.is_expression(), "{err}");
}

#[test]
fn error_locations_point_into_source_after_entities() {
    let err = parse_template("q", "&lt;&lt;&lt;&lt;\n  #{a +}").unwrap_err();
    assert!(err.is_expression(), "{err}");
    assert_eq!(err.location(), Some(Location::new(2, 8)));

    let err = parse_template("q", r#"<if test="a &lt; b +">x</if>"#).unwrap_err();
    assert!(err.is_expression(), "{err}");
    assert_eq!(err.location(), Some(Location::new(1, 21)));

    let err = syntax_error("&quot;ééééé#{");
    assert_eq!(err.location(), Some(Location::new(1, 12)));
}

#[test]
fn source_hash_tracks_source() {
    let a = parse("SELECT 1");
    let b = parse("SELECT 2");
    assert_ne!(a.source_hash(), b.source_hash());
    assert_eq!(a.source_hash(), parse("SELECT 1").source_hash());
}

const BLOG_MAPPER: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<!DOCTYPE mapper PUBLIC "-//mybatis.org//DTD Mapper 3.0//EN" "http://mybatis.org/dtd/mybatis-3-mapper.dtd">
<mapper namespace="blog">
  <!-- columns -->
  <sql id="columns">${alias}.id, ${alias}.title</sql>
  <resultMap id="blogMap" type="Blog">
    <id property="id" column="id"/>
  </resultMap>
  <select id="findById" parameterType="int" resultType="Blog">
    SELECT <include refid="columns"><property name="alias" value="b"/></include>
    FROM blog b WHERE b.id = #{id}
  </select>
  <delete id="deleteById">DELETE FROM blog WHERE id = #{id}</delete>
</mapper>
"#;

#[test]
fn mapper_collects_fragments_and_statements() {
    let mapper = parse_mapper(BLOG_MAPPER).unwrap();
    assert_eq!(mapper.namespace, "blog");
    assert_eq!(mapper.fragments.len(), 1);
    assert_eq!(mapper.fragments[0].id(), "blog.columns");

    let ids: Vec<&str> = mapper.statements.iter().map(Statement::id).collect();
    assert_eq!(ids, vec!["blog.findById", "blog.deleteById"]);
    let find = &mapper.statements[0];
    assert_eq!(find.kind(), StatementKind::Select);
    assert_eq!(find.attribute("resultType"), Some("Blog"));
    assert_eq!(find.attribute("id"), None);
    // Bare refids are qualified with the namespace.
    assert_eq!(find.template().include_refs(), vec!["blog.columns"]);
}

#[test]
fn mapper_errors() {
    let dup = r#"<mapper namespace="m"><sql id="a">x</sql><select id="a">y</select></mapper>"#;
    assert!(parse_mapper(dup).unwrap_err().to_string().contains("duplicate id 'a'"));

    let missing_ns = r#"<mapper><select id="a">y</select></mapper>"#;
    assert!(parse_mapper(missing_ns).unwrap_err().is_syntax());

    let bad_body = "<mapper namespace=\"m\">\n<select id=\"a\"><if>y</if></select></mapper>";
    let err = parse_mapper(bad_body).unwrap_err();
    let DynSqlError::TemplateSyntax { template, location, .. } = err else {
        panic!("expected syntax error");
    };
    assert_eq!(template, "m.a");
    assert_eq!(location.line, 2);

    assert!(parse_mapper("<mapper namespace=\"m\"></mapper> trailing").is_err());
}
