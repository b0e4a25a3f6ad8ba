use crate::{
    aggregate::Averages,
    query::LastN,
    selection::{Field, Selection},
};

fn rule(widths: &[usize]) -> String {
    let mut line = String::from("+");
    for width in widths {
        line.push_str(&"-".repeat(width + 2));
        line.push('+');
    }
    line.push('\n');
    line
}

fn row(widths: &[usize], cells: &[String]) -> String {
    let mut line = String::from("|");
    for (&width, cell) in widths.iter().zip(cells) {
        line.push_str(&format!(" {cell:<width$} |"));
    }
    line.push('\n');
    line
}

/// Boxed table sized to its widest cell per column.
fn render(header: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|cell| cell.len()).collect();
    for cells in rows {
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = (*width).max(cell.len());
        }
    }
    let rule = rule(&widths);
    let mut out = rule.clone();
    out.push_str(&row(&widths, header));
    out.push_str(&rule);
    for cells in rows {
        out.push_str(&row(&widths, cells));
    }
    out.push_str(&rule);
    out
}

fn header(first: &str, fields: &[Field]) -> Vec<String> {
    core::iter::once(first.to_owned())
        .chain(fields.iter().map(|field| field.label().to_owned()))
        .collect()
}

pub fn last_n(selection: &Selection, result: &LastN) -> String {
    let header = header("#", selection.fields());
    let rows: Vec<Vec<String>> = result
        .records
        .iter()
        .map(|record| {
            core::iter::once(record.rank.to_string())
                .chain(record.values.iter().map(|(_, value)| value.to_string()))
                .collect()
        })
        .collect();
    let mut out = render(&header, &rows);
    if result.truncated {
        out.push_str(&format!(
            "Requested {} metrics, only {} available.\n",
            result.requested,
            result.records.len()
        ));
    }
    out
}

pub fn averages(averages: &Averages) -> String {
    let fields: Vec<Field> = averages.as_slice().iter().map(|a| a.field).collect();
    let header = header("", &fields);
    let cells: Vec<String> = core::iter::once("Avg.".to_owned())
        .chain(averages.as_slice().iter().map(|average| match average.mean {
            Some(mean) => format!("{mean:.2}"),
            None => "n/a".to_owned(),
        }))
        .collect();
    render(&header, &[cells])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{aggregate, fixtures::three_ticks, query};

    #[test]
    fn renders_last_n_rows_by_rank() {
        let (_dir, store) = three_ticks();
        let selection = Selection::new([Field::Cpu, Field::S1], 1).unwrap();
        let result = query::last_n(&store, &selection).unwrap();
        let expected = "\
+---+---------+----------+
| # | CPU (%) | Sample 1 |
+---+---------+----------+
| 1 | 30.00   | 9        |
+---+---------+----------+
";
        assert_eq!(last_n(&selection, &result), expected);
    }

    #[test]
    fn announces_truncation() {
        let (_dir, store) = three_ticks();
        let selection = Selection::new([Field::S2], 4).unwrap();
        let result = query::last_n(&store, &selection).unwrap();
        let table = last_n(&selection, &result);
        assert!(table.ends_with("Requested 4 metrics, only 3 available.\n"), "{table}");
        assert_eq!(table.lines().filter(|l| l.starts_with("| ")).count(), 4);
    }

    #[test]
    fn renders_averages_and_empty_means() {
        let (_dir, store) = three_ticks();
        let selection = Selection::new([Field::UsedRam, Field::S4], 0).unwrap();
        let averages = aggregate::average(&store, &selection).unwrap();
        let expected = "\
+------+----------+----------+
|      | RAM (Mb) | Sample 4 |
+------+----------+----------+
| Avg. | 2000.00  | 8.00     |
+------+----------+----------+
";
        assert_eq!(super::averages(&averages), expected);

        let (_dir, empty) = crate::fixtures::open_temp();
        let averages = aggregate::average(&empty, &selection).unwrap();
        assert!(super::averages(&averages).contains("| n/a "));
    }
}
