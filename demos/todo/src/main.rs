use anyhow::{Context, anyhow};
use laterano_core::*;
use laterano_devtools::Inspector;

const TEMPLATE: &str = r#"
<div class="todo-app">
  <h1>{{ title }} ({{ remaining }} left)</h1>
  <input %connect="draft" placeholder="What needs doing?">
  <button @click="add()">Add</button>
  <ul>
    <li %for="(todo, i) in todos" %key="todo.id" :class="todo.done ? 'done' : 'open'">
      <span @click="toggle(todo.id)">{{ i + 1 }}. {{ todo.text }}</span>
      <button @click="remove(todo.id)">x</button>
    </li>
  </ul>
  <p %if="todos.length == 0">Nothing to do.</p>
  <footer></footer>
</div>
"#;

fn todos(c: &Component) -> Vec<Value> {
    match c.get_state("todos") {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

fn id_arg(args: &[Value]) -> anyhow::Result<i64> {
    args.first()
        .and_then(Value::as_i64)
        .ok_or_else(|| anyhow!("expected a todo id, got {args:?}"))
}

fn todo_app() -> Component {
    Component::new(
        ComponentOptions::new("todo-app", TEMPLATE)
            .style(".done { text-decoration: line-through; }")
            .states(json!({
                "title": "Todos",
                "draft": "",
                "nextId": 1,
                "remaining": 0,
                "todos": [],
            }))
            .state_listener("todos", |c, todos| {
                let open = todos
                    .and_then(Value::as_array)
                    .map_or(0, |t| t.iter().filter(|t| t["done"] != json!(true)).count());
                c.set_state("remaining", open);
            })
            .func("add", |c, _| {
                let text = c.get_state("draft").and_then(|d| d.as_str().map(str::trim).map(str::to_string));
                let Some(text) = text.filter(|t| !t.is_empty()) else {
                    return Ok(Value::Null);
                };
                let id = c.get_state("nextId").and_then(|v| v.as_i64()).unwrap_or(1);
                let mut items = todos(c);
                items.push(json!({"id": id, "text": text, "done": false}));
                c.set_state("nextId", id + 1);
                c.set_state("draft", "");
                c.set_state("todos", items);
                Ok(json!(id))
            })
            .func("toggle", |c, args| {
                let id = id_arg(args)?;
                let mut items = todos(c);
                let todo = items
                    .iter_mut()
                    .find(|t| t["id"] == json!(id))
                    .with_context(|| format!("no todo with id {id}"))?;
                let done = todo["done"] == json!(true);
                todo["done"] = json!(!done);
                c.set_state("todos", items);
                Ok(Value::Null)
            })
            .func("remove", |c, args| {
                let id = id_arg(args)?;
                let items: Vec<Value> = todos(c).into_iter().filter(|t| t["id"] != json!(id)).collect();
                c.set_state("todos", items);
                Ok(Value::Null)
            })
            .on_mount(|c| log::info!("<{}> mounted", c.tag())),
    )
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let app = todo_app();
    app.connected();

    let footer = app.find("footer").context("template has a footer")?;
    app.attach_render(footer, |ctx| {
        let total = ctx
            .get_state("todos")
            .and_then(|t| t.as_array().map(Vec::len))
            .unwrap_or(0);
        Rendered::Text(format!("{total} item(s)"))
    });

    let mut inspector = Inspector::new();
    inspector.hud.toggle();

    let input = app.find("input").context("template has an input")?;
    let add = app.find("button").context("template has an add button")?;
    for text in ["write the docs", "ship it", "celebrate"] {
        app.input(input, text);
        app.dispatch_event(add, "click");
        inspector.frame(&app);
    }
    println!("{}\n", app.markup());

    // Toggle the first item, then remove the second.
    let spans = app.find_all("span");
    app.dispatch_event(*spans.first().context("first todo")?, "click");
    let buttons = app.find_all("button");
    app.dispatch_event(*buttons.get(2).context("second remove button")?, "click");
    inspector.frame(&app);
    println!("{}\n", app.markup());

    for d in app.take_diagnostics() {
        println!("diagnostic: {d}");
    }
    println!("{}", inspector.hud.line());

    app.disconnected();
    Ok(())
}
