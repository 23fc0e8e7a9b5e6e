use dynsql::{Context, DynSqlError, Engine, EngineConfig, PlaceholderStyle, RenderError, StatementKind};
use serde::Serialize;
use serde_json::json;

const BLOG_MAPPER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE mapper PUBLIC "-//mybatis.org//DTD Mapper 3.0//EN" "http://mybatis.org/dtd/mybatis-3-mapper.dtd">
<mapper namespace="blog">
  <!-- shared column list -->
  <sql id="columns">${alias}.id, ${alias}.title, ${alias}.state</sql>

  <sql id="activeOnly">${alias}.state = 'ACTIVE'</sql>

  <select id="findById" resultType="Blog">
    SELECT <include refid="columns"><property name="alias" value="b"/></include>
    FROM blog b
    WHERE b.id = #{id}
  </select>

  <select id="findActiveBlogLike">
    SELECT * FROM blog
    <where>
      <if test="state != null">state = #{state}</if>
      <if test="title != null">AND title like #{title}</if>
      <if test="author != null and author.name != null">AND author_name like #{author.name}</if>
    </where>
  </select>

  <select id="findFeatured">
    SELECT * FROM blog b WHERE <include refid="activeOnly"><property name="alias" value="b"/></include>
    <choose>
      <when test="title != null">AND b.title like #{title}</when>
      <when test="featuredOnly">AND b.featured = 1</when>
      <otherwise>AND b.created_at &gt; now() - interval '7 days'</otherwise>
    </choose>
  </select>

  <select id="findByIds">
    SELECT * FROM post
    WHERE id IN
    <foreach collection="ids" item="id" open="(" separator="," close=")">#{id}</foreach>
  </select>

  <select id="search">
    <bind name="pattern" value="'%' + keyword + '%'"/>
    SELECT * FROM blog
    WHERE title LIKE #{pattern} OR body LIKE #{pattern}
    <if test="limit > 0">LIMIT #{limit}</if>
  </select>

  <update id="updateBlog">
    UPDATE blog
    <set>
      <if test="title != null">title = #{title},</if>
      <if test="state != null">state = #{state},</if>
      <if test="tags != null and tags.size() > 0">tags = #{tags},</if>
    </set>
    WHERE id = #{id}
  </update>

  <insert id="insertPosts">
    INSERT INTO post (blog_id, title, body)
    VALUES
    <foreach collection="posts" item="p" separator=",">(#{blogId}, #{p.title}, #{p.body})</foreach>
  </insert>

  <insert id="insertSelective">
    INSERT INTO blog
    <trim prefix="(" suffix=")" suffixOverrides=",">
      <if test="title != null">title,</if>
      <if test="state != null">state,</if>
    </trim>
    <trim prefix="VALUES (" suffix=")" suffixOverrides=",">
      <if test="title != null">#{title},</if>
      <if test="state != null">#{state},</if>
    </trim>
  </insert>

  <delete id="deleteOlderThan">
    DELETE FROM blog WHERE created_at &lt; #{cutoff}
  </delete>
</mapper>
"#;

fn engine(style: PlaceholderStyle) -> Engine {
    let mut engine = Engine::new(EngineConfig::new().placeholder(style));
    engine.load_mapper(BLOG_MAPPER).unwrap();
    engine
}

#[test]
fn mapper_registers_statements_and_fragments() {
    let engine = engine(PlaceholderStyle::Question);
    assert_eq!(
        engine.statement_ids(),
        vec![
            "blog.deleteOlderThan",
            "blog.findActiveBlogLike",
            "blog.findById",
            "blog.findByIds",
            "blog.findFeatured",
            "blog.insertPosts",
            "blog.insertSelective",
            "blog.search",
            "blog.updateBlog",
        ]
    );
    assert_eq!(engine.fragments().ids(), vec!["blog.activeOnly", "blog.columns"]);
    assert!(engine.unresolved_includes().is_empty());

    let find = engine.statement("blog.findById").unwrap();
    assert_eq!(find.kind(), StatementKind::Select);
    assert_eq!(find.attribute("resultType"), Some("Blog"));
    assert_eq!(engine.statement("blog.updateBlog").unwrap().kind(), StatementKind::Update);
    assert_eq!(engine.statement("blog.insertPosts").unwrap().kind(), StatementKind::Insert);
    assert_eq!(engine.statement("blog.deleteOlderThan").unwrap().kind(), StatementKind::Delete);
}

#[test]
fn include_with_properties_and_dollar_placeholders() {
    let engine = engine(PlaceholderStyle::Dollar);
    let result = engine.render("blog.findById", &Context::new().with("id", 42)).unwrap();
    assert_eq!(result.sql, "SELECT b.id, b.title, b.state FROM blog b WHERE b.id = $1");
    assert_eq!(result.params, vec![json!(42)]);
}

#[test]
fn where_drops_leading_connectives() {
    let engine = engine(PlaceholderStyle::Question);

    let none = engine.render("blog.findActiveBlogLike", &Context::new()).unwrap();
    assert_eq!(none.sql, "SELECT * FROM blog");
    assert!(none.params.is_empty());

    let ctx = Context::from_value(json!({"author": {"name": "ann"}}));
    let author = engine.render("blog.findActiveBlogLike", &ctx).unwrap();
    assert_eq!(author.sql, "SELECT * FROM blog WHERE author_name like ?");
    assert_eq!(author.params, vec![json!("ann")]);

    let ctx = Context::new().with("state", "ACTIVE").with("title", "%rust%");
    let both = engine.render("blog.findActiveBlogLike", &ctx).unwrap();
    assert_eq!(both.sql, "SELECT * FROM blog WHERE state = ? AND title like ?");
    assert_eq!(both.params, vec![json!("ACTIVE"), json!("%rust%")]);
}

#[test]
fn choose_falls_through_to_otherwise() {
    let engine = engine(PlaceholderStyle::Question);

    let titled = engine
        .render("blog.findFeatured", &Context::new().with("title", "t").with("featuredOnly", true))
        .unwrap();
    assert_eq!(
        titled.sql,
        "SELECT * FROM blog b WHERE b.state = 'ACTIVE' AND b.title like ?"
    );

    let featured = engine
        .render("blog.findFeatured", &Context::new().with("featuredOnly", true))
        .unwrap();
    assert_eq!(featured.sql, "SELECT * FROM blog b WHERE b.state = 'ACTIVE' AND b.featured = 1");

    let recent = engine.render("blog.findFeatured", &Context::new()).unwrap();
    assert_eq!(
        recent.sql,
        "SELECT * FROM blog b WHERE b.state = 'ACTIVE' AND b.created_at > now() - interval '7 days'"
    );
}

#[test]
fn foreach_builds_in_list() {
    let engine = engine(PlaceholderStyle::Dollar);
    let result = engine
        .render("blog.findByIds", &Context::new().with("ids", vec![1, 3, 5]))
        .unwrap();
    assert_eq!(result.sql, "SELECT * FROM post WHERE id IN ($1,$2,$3)");
    assert_eq!(result.params, vec![json!(1), json!(3), json!(5)]);

    let err = engine
        .render("blog.findByIds", &Context::new().with("ids", 7))
        .unwrap_err();
    assert!(matches!(
        err,
        DynSqlError::Render(RenderError::NotACollection { found: "number", .. })
    ));
}

#[test]
fn bind_is_reused_for_every_placeholder() {
    let engine = engine(PlaceholderStyle::Question);
    let result = engine
        .render("blog.search", &Context::new().with("keyword", "rust").with("limit", 0))
        .unwrap();
    assert_eq!(result.sql, "SELECT * FROM blog WHERE title LIKE ? OR body LIKE ?");
    assert_eq!(result.params, vec![json!("%rust%"), json!("%rust%")]);

    let limited = engine
        .render("blog.search", &Context::new().with("keyword", "rust").with("limit", 10))
        .unwrap();
    assert!(limited.sql.ends_with("LIMIT ?"));
    assert_eq!(limited.params.len(), 3);
}

#[test]
fn set_drops_trailing_comma() {
    let engine = engine(PlaceholderStyle::Dollar);

    let ctx = Context::new().with("id", 1).with("title", "new").with("tags", json!(["a"]));
    let result = engine.render("blog.updateBlog", &ctx).unwrap();
    assert_eq!(result.sql, "UPDATE blog SET title = $1, tags = $2 WHERE id = $3");
    assert_eq!(result.params, vec![json!("new"), json!(["a"]), json!(1)]);

    let ctx = Context::new().with("id", 1).with("tags", json!([]));
    let result = engine.render("blog.updateBlog", &ctx).unwrap();
    assert_eq!(result.sql, "UPDATE blog WHERE id = $1");
}

#[test]
fn batch_insert_from_serialized_rows() {
    #[derive(Serialize)]
    struct Post<'a> {
        title: &'a str,
        body: Option<&'a str>,
    }
    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct NewPosts<'a> {
        blog_id: i64,
        posts: Vec<Post<'a>>,
    }

    let engine = engine(PlaceholderStyle::Dollar);
    let ctx = Context::from_serialize(&NewPosts {
        blog_id: 9,
        posts: vec![
            Post { title: "first", body: Some("hello") },
            Post { title: "second", body: None },
        ],
    })
    .unwrap();
    let result = engine.render("blog.insertPosts", &ctx).unwrap();
    assert_eq!(
        result.sql,
        "INSERT INTO post (blog_id, title, body) VALUES ($1, $2, $3),($4, $5, $6)"
    );
    assert_eq!(
        result.params,
        vec![json!(9), json!("first"), json!("hello"), json!(9), json!("second"), json!(null)]
    );
}

#[test]
fn selective_insert_with_trim() {
    let engine = engine(PlaceholderStyle::Question);
    let result = engine
        .render("blog.insertSelective", &Context::new().with("title", "t"))
        .unwrap();
    assert_eq!(result.sql, "INSERT INTO blog ( title ) VALUES ( ? )");
    assert_eq!(result.params, vec![json!("t")]);
}

#[test]
fn entities_are_decoded_in_text() {
    let engine = engine(PlaceholderStyle::Question);
    let result = engine
        .render("blog.deleteOlderThan", &Context::new().with("cutoff", "2024-01-01"))
        .unwrap();
    assert_eq!(result.sql, "DELETE FROM blog WHERE created_at < ?");
}

#[test]
fn inline_preview_for_logs() {
    let engine = engine(PlaceholderStyle::Dollar);
    let ctx = Context::new().with("title", "it's").with("id", 3);
    let result = engine.render("blog.updateBlog", &ctx).unwrap();
    assert_eq!(
        result.to_inline_sql(),
        "UPDATE blog SET title = 'it''s' WHERE id = 3"
    );
}

#[test]
fn second_mapper_can_include_first_namespace() {
    let mut engine = engine(PlaceholderStyle::Question);
    let namespace = engine
        .load_mapper(
            r#"<mapper namespace="report">
  <select id="activeBlogs">
    SELECT <include refid="blog.columns"><property name="alias" value="x"/></include> FROM blog x
    WHERE <include refid="blog.activeOnly"><property name="alias" value="x"/></include>
  </select>
</mapper>"#,
        )
        .unwrap();
    assert_eq!(namespace, "report");
    let result = engine.render("report.activeBlogs", &Context::new()).unwrap();
    assert_eq!(
        result.sql,
        "SELECT x.id, x.title, x.state FROM blog x WHERE x.state = 'ACTIVE'"
    );
}

#[test]
fn missing_fragment_is_reported_before_and_at_render() {
    let mut engine = Engine::default();
    engine
        .load_mapper(
            r#"<mapper namespace="m">
  <select id="q">SELECT <include refid="other.cols"/> FROM t</select>
</mapper>"#,
        )
        .unwrap();
    assert_eq!(
        engine.unresolved_includes(),
        vec![("m.q", vec!["other.cols".to_string()])]
    );
    let err = engine.render("m.q", &Context::new()).unwrap_err();
    assert!(matches!(
        err,
        DynSqlError::Render(RenderError::MissingFragment(ref id)) if id == "other.cols"
    ));
}
