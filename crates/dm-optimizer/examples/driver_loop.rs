use dm_optimizer::*;
use dm_types::*;

/// Stand-in for the orbit library fit: a paraboloid with its minimum at
/// mass=7, ml=3.
fn fake_fit(mass: f64, ml: f64) -> (f64, f64) {
    let chi2 = (mass - 7.0).powi(2) + 10.0;
    let kinchi2 = 2.0 * (ml - 3.0).powi(2);
    (chi2, kinchi2)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Schwarzschild grid walk example");

    let system = System::new()
        .add_component(
            Component::new("bh", ComponentKind::Plummer, true)
                .with_parameter(Parameter::free(
                    "mass",
                    4.0,
                    GridSettings::new(0.0, 10.0, 1.0),
                ))
                .with_parameter(Parameter::fixed("a", 0.001)),
        )
        .add_parameter(
            Parameter::free("ml", 1.0, GridSettings::new(0.5, 6.0, 1.0).with_minstep(0.5))
                .with_sformat("%.2f"),
        );
    let space = ParameterSpace::new(&system)?;
    println!(
        "Parameter space: {:?} ({} free, {} fixed)",
        space.par_names(),
        space.n_par_free(),
        space.n_par_fixed()
    );

    let settings = GeneratorSettings::new().with_max_models(200);
    let mut table = AllModels::new(&space).with_result_column("which_iter", ColumnType::Int);
    let mut generator = ParameterGenerator::new(space, settings)?;

    loop {
        let first_new = table.len();
        let status = generator.generate(Some(&mut table))?;
        println!(
            "iteration {}: {} new models, stop={}",
            generator.iteration(),
            status.n_new_models,
            status.stop
        );
        if status.stop {
            break;
        }

        for row in first_new..table.len() {
            let (chi2, kinchi2) = fake_fit(table.value(row, "mass")?, table.value(row, "ml")?);
            table.set_result(row, "chi2", CellValue::Float(chi2))?;
            table.set_result(row, "kinchi2", CellValue::Float(kinchi2))?;
            table.set_result(
                row,
                "which_iter",
                CellValue::Int(generator.iteration() as i64),
            )?;
        }
    }

    let best = GridSearch::new(Tolerance::default()).best_fit(&table)?;
    if let Some((row, total)) = best {
        println!(
            "Best model: mass={} ml={} (chi2+kinchi2={total}) after {} models",
            table.value(row, "mass")?,
            table.value(row, "ml")?,
            table.len()
        );
    }

    Ok(())
}
