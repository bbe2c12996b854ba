#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use crate::value::display;
    use crate::*;

    fn component(template: &str, states: Value) -> Component {
        Component::new(ComponentOptions::new("x-test", template).states(states))
    }

    fn texts(c: &Component, tag: &str) -> Vec<String> {
        let doc = c.document();
        let doc = doc.borrow();
        c.find_all(tag).into_iter().map(|n| doc.text_content(n)).collect()
    }

    #[test]
    fn test_text_interpolation_follows_state() {
        let c = component("<p>Hello {{ name }}!</p>", json!({"name": "Ada"}));
        assert_eq!(c.markup(), "<p>Hello Ada!</p>");

        c.set_state("name", "Ada");
        assert_eq!(c.markup(), "<p>Hello Ada!</p>");

        c.set_state("name", "Grace");
        assert_eq!(c.markup(), "<p>Hello Grace!</p>");
    }

    #[test]
    fn test_nested_paths_and_expressions() {
        let c = component(
            "<p>{{ user.first }} {{ user.last }} ({{ items.length }}, {{ total * 2 }})</p>",
            json!({"user": {"first": "Ada", "last": "L"}, "items": [1, 2, 3], "total": 2.5}),
        );
        assert_eq!(c.markup(), "<p>Ada L (3, 5)</p>");

        c.set_state("user", json!({"first": "Grace", "last": "H"}));
        c.set_state("total", 4);
        assert_eq!(c.markup(), "<p>Grace H (3, 8)</p>");
    }

    #[test]
    fn test_get_after_set_on_new_paths() {
        let c = component("<p></p>", json!({"a": 1}));
        for (path, value) in [
            ("a", json!(2)),
            ("profile.name.first", json!("Ada")),
            ("a.deeper", json!([1, 2])),
            ("list", json!([])),
            ("list.0", json!({"x": true})),
        ] {
            c.set_state(path, value.clone());
            assert_eq!(c.get_state(path), Some(value), "{path}");
        }
        assert_eq!(c.get_state("profile.name.last"), None);
        assert_eq!(c.get_state("list.0.x"), Some(json!(true)));
    }

    #[test]
    fn test_sibling_path_write_leaves_text_alone() {
        let c = component("<p>{{a.b}}</p>", json!({"a": {"b": 1}}));
        c.set_state("a.b", 2);
        assert_eq!(c.markup(), "<p>2</p>");

        // Scribble over the node; only a related write may restore it.
        let p = c.find("p").unwrap();
        let text = c.document().borrow().children(p)[0];
        c.document().borrow_mut().set_text(text, "untouched");
        c.set_state("a.c", 9);
        assert_eq!(c.markup(), "<p>untouched</p>");
        c.set_state("a", json!({"b": 3}));
        assert_eq!(c.markup(), "<p>3</p>");
    }

    #[test]
    fn test_undefined_renders_empty() {
        let c = component(r#"<a :title="missing.deep">{{ nope }}|{{ obj.none }}</a>"#, json!({"obj": {}}));
        assert_eq!(c.markup(), r#"<a title="">|</a>"#);
        // Both `missing.deep` and `nope` are unbound names.
        let diags = c.take_diagnostics();
        assert_eq!(diags.len(), 2);
        assert!(diags.iter().all(|d| matches!(d, Diagnostic::Eval { .. })));
    }

    #[test]
    fn test_attribute_bindings() {
        let c = component(
            r#"<a class="link" :href="'/u/' + id" :data-active="id == 7">go</a>"#,
            json!({"id": 7}),
        );
        assert_eq!(
            c.markup(),
            r#"<a class="link" href="/u/7" data-active="true">go</a>"#
        );
        c.set_state("id", 8);
        assert_eq!(
            c.markup(),
            r#"<a class="link" href="/u/8" data-active="false">go</a>"#
        );
    }

    #[test]
    fn test_style_lands_before_template() {
        let c = Component::new(ComponentOptions::new("x-styled", "<p>hi</p>").style("p { color: red; }"));
        assert_eq!(c.markup(), "<style>p { color: red; }</style><p>hi</p>");
    }

    #[test]
    fn test_multiple_roots_are_wrapped() {
        let c = component("<h1>{{ a }}</h1><p>b</p>", json!({"a": 1}));
        assert_eq!(c.markup(), "<div><h1>1</h1><p>b</p></div>");
    }

    #[test]
    fn test_unrelated_writes_do_not_rerender() {
        let c = component("<div><section></section><p>{{ a }}</p></div>", json!({"a": 1, "b": {"c": 1}}));
        let section = c.find("section").unwrap();
        let runs = Rc::new(Cell::new(0));
        {
            let runs = runs.clone();
            c.attach_render(section, move |ctx| {
                runs.set(runs.get() + 1);
                Rendered::Text(display(ctx.get_state("b").as_ref()))
            });
        }
        assert_eq!(runs.get(), 1);

        c.set_state("a", 2);
        assert_eq!(c.tick(), 0);
        assert_eq!(runs.get(), 1);

        c.set_state("b.c", 2);
        assert_eq!(c.tick(), 1);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_render_functions_are_batched_per_tick() {
        let c = component("<div><section></section></div>", json!({"n": 0}));
        let section = c.find("section").unwrap();
        c.attach_render(section, |ctx| {
            Rendered::Markup(format!("<b>{}</b>", display(ctx.get_state("n").as_ref())))
        });
        let frames = Rc::new(Cell::new(0));
        {
            let frames = frames.clone();
            c.set_frame_requester(move || frames.set(frames.get() + 1));
        }
        let before = c.stats().rerenders;

        for n in 1..=5 {
            c.set_state("n", n);
        }
        assert_eq!(frames.get(), 1);
        assert_eq!(c.pending_updates(), 1);
        assert_eq!(c.tick(), 1);
        assert_eq!(c.stats().rerenders, before + 1);
        assert_eq!(c.markup(), "<div><section><b>5</b></section></div>");

        assert_eq!(c.tick(), 0);
        c.set_state("n", 6);
        assert_eq!(frames.get(), 2);
    }

    #[test]
    fn test_two_paths_one_element_one_rerender() {
        let c = component("<div><section></section></div>", json!({"first": "a", "last": "b"}));
        let section = c.find("section").unwrap();
        let runs = Rc::new(Cell::new(0));
        {
            let runs = runs.clone();
            c.attach_render(section, move |ctx| {
                runs.set(runs.get() + 1);
                Rendered::Text(format!(
                    "{} {}",
                    display(ctx.get_state("first").as_ref()),
                    display(ctx.get_state("last").as_ref())
                ))
            });
        }
        c.set_state("first", "x");
        c.set_state("last", "y");
        assert_eq!(runs.get(), 1);
        assert_eq!(c.tick(), 1);
        assert_eq!(runs.get(), 2);
        assert_eq!(c.markup(), "<div><section>x y</section></div>");
    }

    #[test]
    fn test_conditional_moves_the_same_element() {
        let c = component(
            r#"<div><p %if="show">on</p><span>tail</span></div>"#,
            json!({"show": true}),
        );
        let p = c.find("p").unwrap();
        assert_eq!(c.markup(), "<div><!-- %if: show --><p>on</p><span>tail</span></div>");

        c.set_state("show", false);
        assert_eq!(c.markup(), "<div><!-- %if: show --><span>tail</span></div>");
        assert_eq!(c.find("p"), None);

        c.set_state("show", true);
        assert_eq!(c.markup(), "<div><!-- %if: show --><p>on</p><span>tail</span></div>");
        assert_eq!(c.find("p"), Some(p));
    }

    #[test]
    fn test_conditional_on_nested_path() {
        let c = component(
            r#"<div><b %if="user.isAdmin && items.length > 0">admin</b></div>"#,
            json!({"user": {"isAdmin": false}, "items": [1]}),
        );
        assert_eq!(c.find("b"), None);
        c.set_state("user.isAdmin", true);
        assert!(c.find("b").is_some());
        c.set_state("items", json!([]));
        assert_eq!(c.find("b"), None);
    }

    #[test]
    fn test_non_boolean_condition_hides_and_reports() {
        let c = component(r#"<div><b %if="count + 1">x</b></div>"#, json!({"count": 1}));
        assert_eq!(c.find("b"), None);
        assert!(matches!(
            c.take_diagnostics().as_slice(),
            [Diagnostic::Eval {
                error: expr::EvalError::NotBoolean { .. },
                ..
            }]
        ));
    }

    #[test]
    fn test_keyed_list_keeps_elements_across_reorder() {
        let c = component(
            r#"<ul><li %for="todo in todos" %key="todo.id">{{ todo.title }}</li></ul>"#,
            json!({"todos": [{"id": 1, "title": "a"}, {"id": 2, "title": "b"}]}),
        );
        assert_eq!(c.markup(), "<ul><!-- %for: todo in todos --><li>a</li><li>b</li></ul>");
        let before = c.find_all("li");

        c.set_state("todos", json!([{"id": 2, "title": "b!"}, {"id": 1, "title": "a"}]));
        let after = c.find_all("li");
        assert_eq!(after, vec![before[1], before[0]]);
        assert_eq!(texts(&c, "li"), ["b!", "a"]);
        assert!(c.take_diagnostics().is_empty());
    }

    #[test]
    fn test_keyed_list_adds_and_removes() {
        let c = component(
            r#"<ul><li %for="t in todos" %key="t.id">{{ t.title }}</li></ul>"#,
            json!({"todos": [{"id": 1, "title": "a"}, {"id": 2, "title": "b"}]}),
        );
        let first = c.find_all("li")[0];

        c.set_state("todos.2", json!({"id": 3, "title": "c"}));
        assert_eq!(texts(&c, "li"), ["a", "b", "c"]);

        c.set_state("todos", json!([{"id": 1, "title": "a"}, {"id": 3, "title": "c"}]));
        assert_eq!(texts(&c, "li"), ["a", "c"]);
        assert_eq!(c.find_all("li")[0], first);
        assert_eq!(c.stats().list_items, 2);

        c.set_state("todos", json!([]));
        assert_eq!(c.markup(), "<ul><!-- %for: t in todos --></ul>");
    }

    #[test]
    fn test_unkeyed_list_reuses_by_position_and_warns_once() {
        let c = component(
            r#"<ul><li %for="(n, i) in nums">{{ i }}:{{ n }}</li></ul>"#,
            json!({"nums": [10, 20]}),
        );
        assert_eq!(texts(&c, "li"), ["0:10", "1:20"]);
        let before = c.find_all("li");

        c.set_state("nums", json!([30, 10, 20]));
        assert_eq!(texts(&c, "li"), ["0:30", "1:10", "2:20"]);
        assert_eq!(c.find_all("li")[..2], before[..]);

        let unkeyed = c
            .take_diagnostics()
            .into_iter()
            .filter(|d| matches!(d, Diagnostic::UnkeyedList { .. }))
            .count();
        assert_eq!(unkeyed, 1);
    }

    #[test]
    fn test_unkeyed_same_length_replacement_reuses_everything() {
        let c = component(
            r#"<ul><li %for="(item, i) in items">{{ item.name }}</li></ul>"#,
            json!({"items": [{"name": "a"}, {"name": "b"}]}),
        );
        let before = c.find_all("li");
        c.set_state("items", json!([{"name": "z", "extra": 1}, "plain"]));
        assert_eq!(c.find_all("li"), before);
        assert_eq!(texts(&c, "li"), ["z", ""]);
        assert!(c
            .take_diagnostics()
            .iter()
            .any(|d| matches!(d, Diagnostic::UnkeyedList { .. })));
    }

    #[test]
    fn test_list_item_bindings_and_toggles() {
        let c = component(
            r#"<ul><li %for="t in ts" %key="t" %if="t != 'b'" style="color: red" :title="prefix + t">{{ t }}</li></ul>"#,
            json!({"ts": ["a", "b"], "prefix": "#"}),
        );
        assert_eq!(
            c.markup(),
            concat!(
                "<ul><!-- %for: t in ts -->",
                r##"<li style="color: red" title="#a">a</li>"##,
                r##"<li style="color: red; display: none" title="#b">b</li>"##,
                "</ul>"
            )
        );

        c.set_state("prefix", "*");
        assert_eq!(
            c.find_all("li")
                .into_iter()
                .map(|li| c.document().borrow().attribute(li, "title").map(str::to_string))
                .collect::<Vec<_>>(),
            [Some("*a".to_string()), Some("*b".to_string())]
        );
    }

    #[test]
    fn test_nested_lists_see_outer_item() {
        let c = component(
            r#"<div><section %for="g in groups" %key="g.name"><h2>{{ g.name }}</h2><i %for="x in g.items" %key="x">{{ g.name }}{{ x }}</i></section></div>"#,
            json!({"groups": [{"name": "A", "items": [1, 2]}, {"name": "B", "items": [3]}]}),
        );
        assert_eq!(texts(&c, "h2"), ["A", "B"]);
        assert_eq!(texts(&c, "i"), ["A1", "A2", "B3"]);
        assert_eq!(c.stats().lists, 3);
        let sections = c.find_all("section");

        c.set_state("groups.0.items", json!([2, 5]));
        assert_eq!(texts(&c, "i"), ["A2", "A5", "B3"]);
        assert_eq!(c.find_all("section"), sections);

        c.set_state("groups", json!([{"name": "B", "items": []}]));
        assert_eq!(texts(&c, "i"), Vec::<String>::new());
        assert_eq!(c.find_all("section"), vec![sections[1]]);
        assert_eq!(c.stats().lists, 2);
    }

    #[test]
    fn test_non_sequence_keeps_previous_render() {
        let c = component(r#"<ul><li %for="x in xs">{{ x }}</li></ul>"#, json!({"xs": 5}));
        assert!(c.find_all("li").is_empty());
        assert!(c
            .take_diagnostics()
            .iter()
            .any(|d| matches!(d, Diagnostic::NotASequence { found, .. } if found == "5")));

        c.set_state("xs", json!([1]));
        assert_eq!(texts(&c, "li"), ["1"]);
        c.set_state("xs", "oops");
        assert_eq!(texts(&c, "li"), ["1"]);
    }

    #[test]
    fn test_malformed_for_leaves_element_inert() {
        let c = component(r#"<ul><li %for="todos">x</li></ul>"#, json!({"todos": []}));
        assert_eq!(c.markup(), "<ul><li>x</li></ul>");
        assert!(matches!(
            c.take_diagnostics().as_slice(),
            [Diagnostic::Directive { directive, .. }] if directive == "for"
        ));
    }

    #[test]
    fn test_unknown_macro_is_reported() {
        let c = component(r#"<p %bogus="1">x</p>"#, json!({}));
        assert_eq!(c.markup(), "<p>x</p>");
        assert!(matches!(
            c.take_diagnostics().as_slice(),
            [Diagnostic::UnknownMacro { name }] if name == "bogus"
        ));
    }

    #[test]
    fn test_handler_styles() {
        let c = Component::new(
            ComponentOptions::new(
                "x-counter",
                r#"<div><button @click="count++">inc</button><button @click="add(5)">add</button><button @click="e => { count += 2; last = e.type }">two</button><button @click="reset">reset</button><p>{{ count }}</p></div>"#,
            )
            .states(json!({"count": 0}))
            .func("add", |c, args| {
                let n = args.first().and_then(Value::as_i64).unwrap_or(0);
                let cur = c.get_state("count").and_then(|v| v.as_i64()).unwrap_or(0);
                c.set_state("count", cur + n);
                Ok(Value::Null)
            })
            .func("reset", |c, args| {
                assert_eq!(args[0]["type"], json!("click"));
                c.set_state("count", 0);
                Ok(Value::Null)
            }),
        );
        let buttons = c.find_all("button");

        c.dispatch_event(buttons[0], "click");
        assert_eq!(c.get_state("count"), Some(json!(1)));
        c.dispatch_event(buttons[1], "click");
        assert_eq!(c.get_state("count"), Some(json!(6)));
        c.dispatch_event(buttons[2], "click");
        assert_eq!(c.get_state("count"), Some(json!(8)));
        assert_eq!(c.get_state("last"), Some(json!("click")));
        assert_eq!(texts(&c, "p"), ["8"]);

        c.dispatch_event(buttons[3], "click");
        assert_eq!(texts(&c, "p"), ["0"]);
        assert!(c.take_diagnostics().is_empty());
    }

    #[test]
    fn test_handler_sees_event_and_element() {
        let c = component(
            r#"<div><input value="typed" @change="name = $el.value"><button @click="setState('clicked', $event.target.tagName)">b</button></div>"#,
            json!({}),
        );
        c.dispatch_event(c.find("input").unwrap(), "change");
        assert_eq!(c.get_state("name"), Some(json!("typed")));
        c.dispatch_event(c.find("button").unwrap(), "click");
        assert_eq!(c.get_state("clicked"), Some(json!("BUTTON")));
    }

    #[test]
    fn test_failing_handler_reports_and_continues() {
        let c = component(
            r#"<div><button @click="count +">bad</button><button @click="missing()">gone</button><button @click="count++">ok</button></div>"#,
            json!({"count": 0}),
        );
        let buttons = c.find_all("button");
        c.dispatch_event(buttons[0], "click");
        c.dispatch_event(buttons[0], "click");
        c.dispatch_event(buttons[1], "click");
        c.dispatch_event(buttons[2], "click");
        assert_eq!(c.get_state("count"), Some(json!(1)));

        let diags = c.take_diagnostics();
        assert_eq!(diags.len(), 3);
        assert!(diags.iter().all(|d| matches!(d, Diagnostic::Handler { .. })));
    }

    #[test]
    fn test_item_handlers_read_current_item() {
        let c = component(
            r#"<ul><li %for="t in todos" %key="t.id" @click="selected = t.title">{{ t.title }}</li></ul>"#,
            json!({"todos": [{"id": 1, "title": "a"}, {"id": 2, "title": "b"}]}),
        );
        let first = c.find_all("li")[0];
        c.dispatch_event(first, "click");
        assert_eq!(c.get_state("selected"), Some(json!("a")));

        c.set_state("todos.0.title", "renamed");
        c.dispatch_event(first, "click");
        assert_eq!(c.get_state("selected"), Some(json!("renamed")));
    }

    #[test]
    fn test_item_names_are_read_only_in_handlers() {
        let c = component(
            r#"<ul><li %for="t in ts" %key="t" @click="t = 'x'">{{ t }}</li></ul>"#,
            json!({"ts": ["a"]}),
        );
        c.take_diagnostics();
        c.dispatch_event(c.find("li").unwrap(), "click");
        assert_eq!(c.get_state("t"), None);
        assert!(matches!(c.take_diagnostics().as_slice(), [Diagnostic::Handler { .. }]));
    }

    #[test]
    fn test_connect_on_controls_is_two_way() {
        let c = component(
            r#"<div><input %connect="name"><span>{{ name }}</span></div>"#,
            json!({"name": "Ada"}),
        );
        let input = c.find("input").unwrap();
        assert_eq!(c.document().borrow().value(input), Some("Ada"));

        c.input(input, "Bo");
        assert_eq!(c.get_state("name"), Some(json!("Bo")));
        assert_eq!(texts(&c, "span"), ["Bo"]);

        c.set_state("name", "Cy");
        assert_eq!(c.document().borrow().value(input), Some("Cy"));
    }

    #[test]
    fn test_connect_on_plain_elements_uses_attribute() {
        let c = component(r#"<div><p %connect="title"></p><b %connect="nothing"></b></div>"#, json!({"title": "T"}));
        assert_eq!(
            c.markup(),
            r#"<div><p data-laterano-connect="T"></p><b></b></div>"#
        );
        c.set_state("title", "U");
        let p = c.find("p").unwrap();
        assert_eq!(c.document().borrow().attribute(p, CONNECT_ATTRIBUTE), Some("U"));
        assert!(matches!(
            c.take_diagnostics().as_slice(),
            [Diagnostic::MissingConnectState { path }] if path == "nothing"
        ));
    }

    #[test]
    fn test_bindings_cannot_reach_functions() {
        let calls = Rc::new(Cell::new(0));
        let c = {
            let calls = calls.clone();
            Component::new(
                ComponentOptions::new("x-iso", "<p>{{ add(1) }}|{{ window.alert }}|{{ constructor }}</p>").func(
                    "add",
                    move |_, _| {
                        calls.set(calls.get() + 1);
                        Ok(json!(1))
                    },
                ),
            )
        };
        assert_eq!(c.markup(), "<p>||</p>");
        assert_eq!(calls.get(), 0);
        assert_eq!(c.take_diagnostics().len(), 3);
    }

    #[test]
    fn test_trigger_func_and_unknown_names() {
        let c = Component::new(
            ComponentOptions::new("x-f", "<p>{{ n }}</p>")
                .states(json!({"n": 1}))
                .func("double", |c, _| {
                    let n = c.get_state("n").and_then(|v| v.as_i64()).unwrap_or(0);
                    c.set_state("n", n * 2);
                    Ok(json!(n * 2))
                })
                .func("fail", |_, _| Err(anyhow::anyhow!("boom"))),
        );
        assert_eq!(c.trigger_func("double", &[]).unwrap(), json!(2));
        assert_eq!(c.markup(), "<p>2</p>");

        assert!(matches!(
            c.trigger_func("fail", &[]),
            Err(HandlerError::Function { .. })
        ));
        assert!(matches!(
            c.trigger_func("nope", &[]),
            Err(HandlerError::UnknownFunction { .. })
        ));
        assert!(matches!(
            c.take_diagnostics().as_slice(),
            [Diagnostic::UnknownFunction { name }] if name == "nope"
        ));
    }

    #[test]
    fn test_diagnostics_are_capped() {
        let c = component("<p></p>", json!({}));
        for _ in 0..DIAGNOSTIC_CAPACITY + 10 {
            let _ = c.trigger_func("nope", &[]);
        }
        assert_eq!(c.take_diagnostics().len(), DIAGNOSTIC_CAPACITY);
        assert!(c.take_diagnostics().is_empty());
    }

    #[test]
    fn test_state_listeners_fire_for_exact_path() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let c = {
            let seen = seen.clone();
            Component::new(
                ComponentOptions::new("x-l", "<p>{{ a }}</p>")
                    .states(json!({"a": 1}))
                    .state_listener("a", move |_, v| seen.borrow_mut().push(v.cloned())),
            )
        };
        c.set_state("a", 2);
        c.set_state("b", 3);
        c.set_state("a", json!(null));
        assert_eq!(*seen.borrow(), [Some(json!(2)), Some(Value::Null)]);
    }

    #[test]
    fn test_lifecycle_and_observed_attributes() {
        let log = Rc::new(RefCell::new(Vec::<String>::new()));
        let c = {
            let (mount, unmount, attr) = (log.clone(), log.clone(), log.clone());
            Component::new(
                ComponentOptions::new("x-life", "<p></p>")
                    .on_mount(move |_| mount.borrow_mut().push("mount".into()))
                    .on_unmount(move |_| unmount.borrow_mut().push("unmount".into()))
                    .on_attribute_changed(move |_, name, old, new| {
                        attr.borrow_mut().push(format!("{name}:{old:?}->{new:?}"))
                    }),
            )
        };
        assert_eq!(c.observed_attributes(), ["data-attribute"]);

        c.connected();
        assert!(c.is_connected());
        c.attribute_changed("data-attribute", None, Some("1"));
        c.attribute_changed("class", None, Some("x"));
        c.disconnected();
        assert!(!c.is_connected());

        assert_eq!(
            *log.borrow(),
            ["mount", r#"data-attribute:None->Some("1")"#, "unmount"]
        );
    }

    #[test]
    fn test_non_object_initial_state_starts_empty() {
        let c = component("<p>{{ a }}</p>", json!([1, 2]));
        assert_eq!(c.state(), json!({}));
        c.set_state("a.b", 1);
        assert_eq!(c.state(), json!({"a": {"b": 1}}));
    }

    #[test]
    fn test_todo_markup_snapshot() {
        let c = component(
            r#"<div class="todos"><h1>{{ title }}</h1><ul><li %for="(t, i) in todos" %key="t.id" :class="t.done ? 'done' : 'open'">{{ i + 1 }}. {{ t.text }}</li></ul><p %if="todos.length == 0">Nothing to do</p></div>"#,
            json!({
                "title": "Today",
                "todos": [
                    {"id": "a", "text": "write", "done": true},
                    {"id": "b", "text": "test", "done": false},
                ],
            }),
        );
        insta::assert_snapshot!(c.markup(), @r#"<div class="todos"><h1>Today</h1><ul><!-- %for: (t, i) in todos --><li class="done">1. write</li><li class="open">2. test</li></ul><!-- %if: todos.length == 0 --></div>"#);

        c.set_state("todos", json!([]));
        insta::assert_snapshot!(c.markup(), @r#"<div class="todos"><h1>Today</h1><ul><!-- %for: (t, i) in todos --></ul><!-- %if: todos.length == 0 --><p>Nothing to do</p></div>"#);
    }

    #[test]
    fn test_numeric_segments_in_expressions_and_handlers() {
        let c = component(
            r#"<div><button @click="todos.0.done = true">t</button><p>{{ todos.0.text + '!' }}</p><i>{{ grid.1.0 * 2 }}</i></div>"#,
            json!({"todos": [{"text": "a", "done": false}], "grid": [[1], [4]]}),
        );
        assert_eq!(c.markup(), "<div><button>t</button><p>a!</p><i>8</i></div>");

        c.dispatch_event(c.find("button").unwrap(), "click");
        assert_eq!(c.get_state("todos.0.done"), Some(json!(true)));

        c.set_state("todos.0.text", "b");
        c.set_state("grid.1", json!([2.5]));
        assert_eq!(c.markup(), "<div><button>t</button><p>b!</p><i>5</i></div>");
        assert!(c.take_diagnostics().is_empty());
    }

    #[test]
    fn test_length_reads_follow_index_writes() {
        let c = component(
            r#"<div><span>{{ todos.length }}</span><ul><li %for="t in todos">{{ t }}</li></ul><p %if="todos.length == 0">empty</p></div>"#,
            json!({"todos": []}),
        );
        assert_eq!(
            c.markup(),
            "<div><span>0</span><ul><!-- %for: t in todos --></ul><!-- %if: todos.length == 0 --><p>empty</p></div>"
        );

        c.set_state("todos.0", "a");
        assert_eq!(
            c.markup(),
            "<div><span>1</span><ul><!-- %for: t in todos --><li>a</li></ul><!-- %if: todos.length == 0 --></div>"
        );

        c.set_state("todos.1", "b");
        assert_eq!(texts(&c, "span"), ["2"]);
        assert_eq!(texts(&c, "li"), ["a", "b"]);
    }

    #[test]
    fn test_for_on_template_root_is_rejected() {
        let c = component(r#"<li %for="x in xs">{{ x }}</li>"#, json!({"xs": [1, 2]}));
        assert_eq!(c.markup(), "<li></li>");
        assert_eq!(c.stats().lists, 0);
        assert!(c.take_diagnostics().iter().any(|d| matches!(
            d,
            Diagnostic::Directive { directive, reason, .. }
                if directive == "for" && reason.contains("template root")
        )));
    }

    #[test]
    fn test_render_fn_drops_bindings_of_replaced_children() {
        let c = component(
            r#"<div><section><p>{{ n }}</p><b :title="n">x</b><em %if="n > 5">big</em><u %for="x in xs" %key="x">{{ x }}</u></section></div>"#,
            json!({"n": 1, "xs": [1]}),
        );
        let before = c.stats();
        assert_eq!(
            (before.text_bindings, before.attribute_bindings, before.conditionals, before.lists),
            (1, 1, 1, 1)
        );

        let section = c.find("section").unwrap();
        c.attach_render(section, |ctx| {
            Rendered::Markup(format!("<i>{}</i>", display(ctx.get_state("n").as_ref())))
        });
        let after = c.stats();
        assert_eq!(
            (after.text_bindings, after.attribute_bindings, after.conditionals, after.lists),
            (0, 0, 0, 0)
        );

        let nodes = c.document().borrow().len();
        c.set_state("n", 9);
        c.set_state("xs", json!([1, 2]));
        assert_eq!(c.tick(), 1);
        assert_eq!(c.markup(), "<div><section><i>9</i></section></div>");
        assert_eq!(c.document().borrow().len(), nodes);
        assert!(c.take_diagnostics().is_empty());
    }
}
