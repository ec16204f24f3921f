//! SGPA and CGPA computation

use crate::grading::{CreditTally, GradingPolicy};
use automarks_common::db::ResultRow;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One step of a student's grade point progression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemesterGpa {
    pub semester: i32,
    pub total_credits: i64,
    pub sgpa: f64,
    pub cgpa: f64,
}

/// SGPA of one student in one semester
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentSgpa {
    pub usn: String,
    pub student_name: String,
    pub total_credits: i64,
    pub sgpa: f64,
}

/// SGPA per semester and running CGPA for one student's rows.
/// Semesters without graded credits are omitted.
pub fn gpa_progression(policy: &GradingPolicy, rows: &[&ResultRow]) -> Vec<SemesterGpa> {
    let mut cumulative = CreditTally::default();

    policy
        .semester_credits(rows)
        .into_iter()
        .filter_map(|(semester, tally)| {
            let sgpa = tally.average()?;
            cumulative.add(&tally);
            Some(SemesterGpa {
                semester,
                total_credits: tally.credits,
                sgpa,
                cgpa: cumulative.average()?,
            })
        })
        .collect()
}

/// Final CGPA, `None` without graded credits
pub fn final_cgpa(policy: &GradingPolicy, rows: &[&ResultRow]) -> Option<f64> {
    gpa_progression(policy, rows).last().map(|step| step.cgpa)
}

/// Group rows by USN, preserving store order within each student
pub fn rows_by_student(rows: &[ResultRow]) -> BTreeMap<&str, Vec<&ResultRow>> {
    let mut students: BTreeMap<&str, Vec<&ResultRow>> = BTreeMap::new();
    for row in rows {
        students.entry(row.usn.as_str()).or_default().push(row);
    }
    students
}

/// SGPA of every student with graded credits in `semester`, ordered by USN
pub fn semester_sgpa(policy: &GradingPolicy, semester: i32, rows: &[ResultRow]) -> Vec<StudentSgpa> {
    rows_by_student(rows)
        .into_iter()
        .filter_map(|(usn, student_rows)| {
            let in_semester: Vec<&ResultRow> = student_rows
                .into_iter()
                .filter(|r| r.semester == semester)
                .collect();
            let tally = policy.semester_credits(&in_semester).remove(&semester)?;
            Some(StudentSgpa {
                usn: usn.to_string(),
                student_name: in_semester[0].student_name.clone(),
                total_credits: tally.credits,
                sgpa: tally.average()?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{fail, pass, with_credits};

    #[test]
    fn test_sgpa_weighted_by_credits() {
        let rows = vec![
            pass("1SV22AD005", 5, "A", 160),
            with_credits(pass("1SV22AD005", 5, "B", 90), Some(3)),
        ];

        let sgpa = semester_sgpa(&GradingPolicy::default(), 5, &rows);
        assert_eq!(sgpa.len(), 1);
        assert_eq!(sgpa[0].total_credits, 7);
        assert_eq!(sgpa[0].sgpa, 7.29);
    }

    #[test]
    fn test_default_and_zero_credits() {
        let rows = vec![
            with_credits(pass("1SV22AD005", 1, "BMATS101", 180), None),
            with_credits(pass("1SV22AD005", 1, "BIDTK158", 40), Some(0)),
        ];
        let progression = gpa_progression(&GradingPolicy::default(), &rows.iter().collect::<Vec<_>>());
        assert_eq!(progression[0].total_credits, 4);
        assert_eq!(progression[0].sgpa, 10.0);
    }

    #[test]
    fn test_semester_without_graded_credits_omitted() {
        let rows = vec![
            pass("1SV22AD005", 1, "BMATS101", 150),
            with_credits(pass("1SV22AD005", 2, "BPE201", 150), Some(0)),
            pass("1SV22AD005", 3, "BCS301", 110),
        ];
        let refs: Vec<&ResultRow> = rows.iter().collect();
        let progression = gpa_progression(&GradingPolicy::default(), &refs);

        let semesters: Vec<i32> = progression.iter().map(|p| p.semester).collect();
        assert_eq!(semesters, vec![1, 3]);
        assert!(semester_sgpa(&GradingPolicy::default(), 2, &rows).is_empty());
    }

    #[test]
    fn test_cgpa_between_sgpa_bounds() {
        let rows = vec![
            pass("1SV22AD005", 1, "BMATS101", 190),
            pass("1SV22AD005", 1, "BPHY102", 130),
            pass("1SV22AD005", 2, "BMATS201", 100),
            fail("1SV22AD005", 2, "BCHE202", 50),
            pass("1SV22AD005", 3, "BCS301", 170),
            with_credits(pass("1SV22AD005", 3, "BCS302", 145), Some(3)),
        ];
        let refs: Vec<&ResultRow> = rows.iter().collect();
        let progression = gpa_progression(&GradingPolicy::default(), &refs);
        assert_eq!(progression.len(), 3);

        for (n, step) in progression.iter().enumerate() {
            let seen = &progression[..=n];
            let min = seen.iter().map(|s| s.sgpa).fold(f64::MAX, f64::min);
            let max = seen.iter().map(|s| s.sgpa).fold(f64::MIN, f64::max);
            assert!(step.cgpa >= min - 0.01 && step.cgpa <= max + 0.01);
        }

        assert_eq!(final_cgpa(&GradingPolicy::default(), &refs), Some(progression[2].cgpa));
    }
}
