//! Reaction Time Example - Fixation, then a choice target in the terminal.
//!
//! Each trial shows a fixation cross for 500ms, then a target that stays up
//! until the participant presses F (left) or J (right). Results are printed
//! as JSON rows after the terminal is restored.
//!
//! Run with: RUST_LOG=debug cargo run --example reaction_time

use psyframe::{
    listener, record, App, AppOptions, Reactive, Record, Runtime, SceneContext, SceneEvent,
    SceneOptions, Setup, TerminalHost,
};

const TRIALS: usize = 6;

fn fixation(_: &Reactive, _: &SceneContext) -> anyhow::Result<Setup> {
    Ok(Setup::new("+"))
}

fn target(props: &Reactive, ctx: &SceneContext) -> anyhow::Result<Setup> {
    for key in ["f", "j"] {
        let ctx2 = ctx.clone();
        ctx.on(
            &format!("key:{key}"),
            listener(move |ev: &SceneEvent| {
                if let (Some(props), Some(ev)) = (ctx2.props(), ev.dom_event()) {
                    props.set("response", key);
                    props.set("response_time", ev.timestamp());
                }
                ctx2.close()?;
                Ok(())
            }),
        );
    }

    let props = props.clone();
    Ok(Setup::new("Which side? [F] left  [J] right").with_data(move || {
        record! {
            "side" => props.get("side").unwrap_or_default(),
            "response" => props.get("response").unwrap_or_default(),
            "response_time" => props.get("response_time").unwrap_or_default(),
        }
    }))
}

fn run(runtime: &mut Runtime<TerminalHost>) -> psyframe::Result<Vec<Record>> {
    runtime.block_on(async {
        let app = App::create(AppOptions::new()).await?;
        let cross = app.scene(fixation, SceneOptions::new().duration(500.0))?;
        let choice = app.scene(
            target,
            SceneOptions::new().with_defaults(record! { "side" => "left", "response" => "" }),
        )?;

        let mut rows = Vec::with_capacity(TRIALS);
        for trial in 0..TRIALS {
            cross.show(None)?.await?;
            let side = if trial % 2 == 0 { "left" } else { "right" };
            let result = choice.show(Some(record! { "side" => side }))?.await?;

            let mut row = result.to_record();
            let rt = result
                .get("response_time")
                .and_then(|v| v.as_f64())
                .map(|t| t - result.start_time);
            row.insert("trial".into(), trial.into());
            row.insert("rt".into(), rt.into());
            row.insert("frame_ms".into(), app.frame_ms().into());
            rows.push(row);
        }

        app.dispose();
        Ok::<_, psyframe::Error>(rows)
    })?
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut runtime = Runtime::new(TerminalHost::new()?);
    let rows = run(&mut runtime);
    drop(runtime);

    match rows {
        Ok(rows) => {
            for row in rows {
                println!("{}", serde_json::to_string(&row)?);
            }
        }
        Err(psyframe::Error::Aborted) => eprintln!("session ended by the participant"),
        Err(err) => return Err(err.into()),
    }
    Ok(())
}
