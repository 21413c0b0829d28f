use physics::{BodyId, BodyList, ListNodeId};

#[test]
fn view_matches_list_after_update() {
    let mut list = BodyList::new();
    let handles: Vec<ListNodeId> = (0..6).map(|i| list.add_item(BodyId::new(i))).collect();
    assert!(list.update_view());
    assert_eq!(list.view().len(), 6);

    list.remove_item(handles[0]);
    list.remove_item(handles[3]);
    list.remove_item(handles[5]);
    assert!(list.is_dirty());
    // Stale until the next update
    assert_eq!(list.view().len(), 6);

    assert!(list.update_view());
    assert_eq!(
        list.view(),
        &[BodyId::new(1), BodyId::new(2), BodyId::new(4)]
    );
    assert!(!list.update_view());
}

#[test]
fn random_churn_matches_reference() {
    let mut rng = fastrand::Rng::with_seed(3);
    let mut list = BodyList::new();
    let mut reference: Vec<(ListNodeId, BodyId)> = Vec::new();

    for i in 0..500 {
        if reference.is_empty() || rng.bool() {
            let body = BodyId::new(i);
            reference.push((list.add_item(body), body));
        } else {
            let (handle, body) = reference.remove(rng.usize(..reference.len()));
            assert_eq!(list.remove_item(handle), Some(body));
        }
        if rng.u8(..) < 32 {
            list.update_view();
            let expected: Vec<BodyId> = reference.iter().map(|(_, body)| *body).collect();
            assert_eq!(list.view(), expected.as_slice());
        }
    }
    assert_eq!(list.len(), reference.len());
}
